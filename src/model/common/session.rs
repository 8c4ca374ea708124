use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// Shortest session that may be opened, in minutes.
pub const MIN_SESSION_MINUTES: i64 = 1;
/// Longest session that may be opened, in minutes.
pub const MAX_SESSION_MINUTES: i64 = 60;

/// The half-open interval `[opens_at, closes_at)` during which a motion
/// accepts votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    opens_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    closes_at: DateTime<Utc>,
}

impl SessionWindow {
    /// A window opening at `opens_at` and lasting `duration_minutes`.
    ///
    /// Returns `None` unless the duration is within
    /// `MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES`.
    pub fn starting_at(opens_at: DateTime<Utc>, duration_minutes: i64) -> Option<Self> {
        if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&duration_minutes) {
            return None;
        }
        Some(Self {
            opens_at,
            closes_at: opens_at + Duration::minutes(duration_minutes),
        })
    }

    pub fn opens_at(&self) -> DateTime<Utc> {
        self.opens_at
    }

    pub fn closes_at(&self) -> DateTime<Utc> {
        self.closes_at
    }

    /// Is the session accepting votes at `now`?
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now < self.closes_at
    }

    /// Has the session finished by `now`? A finished window may be replaced.
    pub fn has_closed_by(&self, now: DateTime<Utc>) -> bool {
        self.closes_at <= now
    }
}

/// States in the voting session lifecycle of a motion.
///
/// `Closed` is terminal for a given window; opening again installs a fresh
/// window rather than leaving `Closed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has ever been opened.
    Unopened,
    /// Accepting votes.
    Open,
    /// The most recent window has elapsed.
    Closed,
}

impl SessionState {
    /// Derive the state from the stored window and the current time.
    pub fn of(window: Option<&SessionWindow>, now: DateTime<Utc>) -> Self {
        match window {
            None => Self::Unopened,
            Some(window) if window.is_open_at(now) => Self::Open,
            // A window that has not started yet can only come from clock
            // skew between writers; it is not accepting votes.
            Some(_) => Self::Closed,
        }
    }
}
