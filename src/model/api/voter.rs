use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{body::RequestBody, id::ApiId},
    db::Voter,
};

/// A request to register a voter, or to change a voter's identity number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSpec {
    /// National identity number, optionally punctuated.
    pub external_id: String,
}

impl RequestBody for VoterSpec {}

/// A request to change a voter's eligibility.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatusChange {
    pub active: bool,
}

impl RequestBody for VoterStatusChange {}

/// A voter as seen by API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub external_id: String,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            external_id: voter.voter.external_id.into(),
            registered_at: voter.voter.registered_at,
            active: voter.voter.active,
        }
    }
}

/// Whether an identity may currently vote.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eligibility {
    AbleToVote,
    UnableToVote,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityStatus {
    pub status: Eligibility,
}

impl From<bool> for EligibilityStatus {
    fn from(eligible: bool) -> Self {
        let status = if eligible {
            Eligibility::AbleToVote
        } else {
            Eligibility::UnableToVote
        };
        Self { status }
    }
}
