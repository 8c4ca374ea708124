use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json::{self, Map, Value};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::{body::RequestBody, id::ApiId},
    common::{SessionState, SessionWindow},
    db::Motion,
};

/// A request to create a motion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSpec {
    pub title: String,
    pub description: String,
}

impl RequestBody for MotionSpec {}

/// A request to open a voting session. Omitting the duration uses the
/// configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

impl RequestBody for OpenSessionRequest {
    /// Anything given as the duration that is not a whole number of minutes
    /// is an invalid duration.
    fn shape_error(fields: &Map<String, Value>, cause: &serde_json::Error) -> Error {
        match fields.get("duration_minutes") {
            Some(minutes) => Error::InvalidDuration(minutes.to_string()),
            None => Error::InvalidInput(format!("Malformed session request: {cause}")),
        }
    }
}

/// API-friendly session window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindowDescription {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl From<SessionWindow> for SessionWindowDescription {
    fn from(window: SessionWindow) -> Self {
        Self {
            opens_at: window.opens_at(),
            closes_at: window.closes_at(),
        }
    }
}

/// A motion as seen by API clients, including its session state at the
/// time the response was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub session: Option<SessionWindowDescription>,
    pub session_state: SessionState,
}

impl MotionDescription {
    pub fn new(motion: Motion, now: DateTime<Utc>) -> Self {
        let session_state = motion.session_state(now);
        Self {
            id: motion.id.into(),
            title: motion.motion.title,
            description: motion.motion.description,
            created_at: motion.motion.created_at,
            session: motion.motion.session.map(Into::into),
            session_state,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl MotionSpec {
        pub fn example() -> Self {
            Self {
                title: "Budget 2025".to_string(),
                description: "Approve the proposed budget for the next fiscal year.".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                title: "New bylaws".to_string(),
                description: "Adopt the revised association bylaws.".to_string(),
            }
        }
    }
}
