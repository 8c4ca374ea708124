use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{SessionState, SessionWindow},
    mongodb::Id,
};

/// Core motion data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCore {
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// The current (or most recent) session window, if one was ever opened.
    pub session: Option<SessionWindow>,
}

impl MotionCore {
    /// Create a motion with no session window.
    pub fn new(title: String, description: String, created_at: DateTime<Utc>) -> Self {
        Self {
            title,
            description,
            created_at,
            session: None,
        }
    }

    /// Where is this motion in its session lifecycle at `now`?
    pub fn session_state(&self, now: DateTime<Utc>) -> SessionState {
        SessionState::of(self.session.as_ref(), now)
    }

    /// Is the session accepting votes at `now`?
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.session_state(now) == SessionState::Open
    }
}

/// A motion without an ID.
pub type NewMotion = MotionCore;

/// A motion from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub motion: MotionCore,
}

impl Deref for Motion {
    type Target = MotionCore;

    fn deref(&self) -> &Self::Target {
        &self.motion
    }
}
