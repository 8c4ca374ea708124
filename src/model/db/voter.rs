use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::ExternalId, mongodb::Id};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// National identity number; unique across voters.
    pub external_id: ExternalId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
    /// Only active voters may vote.
    pub active: bool,
    /// Number of votes recorded for this voter. Maintained in the same
    /// atomic step as each vote insert, so a voter with `votes_cast == 0`
    /// is guaranteed to have no votes.
    pub votes_cast: u64,
}

impl VoterCore {
    /// Create a new, active voter.
    pub fn new(external_id: ExternalId, registered_at: DateTime<Utc>) -> Self {
        Self {
            external_id,
            registered_at,
            active: true,
            votes_cast: 0,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// Is this voter currently allowed to vote?
    pub fn is_eligible(&self) -> bool {
        self.active
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}
