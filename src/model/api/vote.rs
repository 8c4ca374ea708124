use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json::{self, Map, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{body::RequestBody, id::ApiId},
    common::VoteChoice,
    db::Vote,
    mongodb::Id,
};

/// A request to cast a vote. Both fields are validated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub voter_id: String,
    /// `YES` or `NO`.
    pub choice: String,
}

impl VoteSpec {
    /// Validate the raw fields into a voter ID and a choice.
    pub fn parse(&self) -> Result<(Id, VoteChoice)> {
        let choice = self.choice.parse().map_err(Error::InvalidChoice)?;
        let voter_id = ApiId::parse("voter_id", &self.voter_id)?;
        Ok((voter_id, choice))
    }
}

impl RequestBody for VoteSpec {
    /// The choice is checked first here too: a missing, non-string or
    /// unknown choice is `InvalidChoice` whatever else is wrong.
    fn shape_error(fields: &Map<String, Value>, cause: &serde_json::Error) -> Error {
        match fields.get("choice") {
            Some(Value::String(choice)) => match choice.parse::<VoteChoice>() {
                Ok(_) => Error::InvalidInput(format!("Malformed vote: {cause}")),
                Err(choice) => Error::InvalidChoice(choice),
            },
            Some(choice) => Error::InvalidChoice(choice.to_string()),
            None => Error::InvalidChoice(String::new()),
        }
    }
}

/// A recorded vote as seen by API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    pub id: ApiId,
    pub motion_id: ApiId,
    pub voter_id: ApiId,
    pub choice: VoteChoice,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            motion_id: vote.motion_id.into(),
            voter_id: vote.voter_id.into(),
            choice: vote.choice,
            cast_at: vote.cast_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoteSpec {
        pub fn new(voter_id: Id, choice: &str) -> Self {
            Self {
                voter_id: voter_id.to_string(),
                choice: choice.to_string(),
            }
        }
    }
}
