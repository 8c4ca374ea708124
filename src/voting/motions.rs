use std::ops::RangeInclusive;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Paginated, Pagination},
    db::{Motion, NewMotion},
    mongodb::Id,
};
use crate::store::SharedStore;

use super::{Clock, SharedClock};

const TITLE_LEN: RangeInclusive<usize> = 3..=100;
const DESCRIPTION_LEN: RangeInclusive<usize> = 5..=500;

/// Motions and their metadata. Session windows are managed by
/// [`VotingSession`](super::VotingSession).
#[derive(Clone)]
pub struct MotionStore {
    store: SharedStore,
    clock: SharedClock,
}

impl MotionStore {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Create a motion with no session. Surrounding whitespace is trimmed
    /// before the length checks.
    pub async fn create(&self, title: &str, description: &str) -> Result<Motion> {
        let title = checked_text("title", title, TITLE_LEN)?;
        let description = checked_text("description", description, DESCRIPTION_LEN)?;
        let motion = self
            .store
            .insert_motion(NewMotion::new(title, description, self.clock.now()))
            .await?;
        info!("Created motion {} {:?}", motion.id, motion.title);
        Ok(motion)
    }

    pub async fn get(&self, motion_id: Id) -> Result<Motion> {
        self.store
            .motion(motion_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Motion {motion_id}")))
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Paginated<Motion>> {
        let (motions, total) = self.store.motions(pagination).await?;
        Ok(pagination.paginate(total, motions))
    }
}

fn checked_text(field: &str, raw: &str, len: RangeInclusive<usize>) -> Result<String> {
    let text = raw.trim();
    let chars = text.chars().count();
    if !len.contains(&chars) {
        warn!("Rejected motion {field} of {chars} characters");
        return Err(Error::InvalidInput(format!(
            "`{field}` must be between {} and {} characters, found {chars}",
            len.start(),
            len.end()
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::model::common::SessionState;
    use crate::store::MemoryStore;
    use crate::voting::ManualClock;

    use super::*;

    fn motions() -> MotionStore {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        MotionStore::new(Arc::new(MemoryStore::new()), Arc::new(clock))
    }

    #[rocket::async_test]
    async fn create_trims_and_starts_unopened() {
        let motions = motions();
        let motion = motions
            .create("  Budget 2025 ", "Approve the budget.\n")
            .await
            .unwrap();
        assert_eq!(motion.title, "Budget 2025");
        assert_eq!(motion.description, "Approve the budget.");
        assert_eq!(motion.session, None);
        assert_eq!(
            motion.session_state(motion.created_at),
            SessionState::Unopened
        );
        assert_eq!(motions.get(motion.id).await.unwrap(), motion);
    }

    #[rocket::async_test]
    async fn create_enforces_lengths() {
        let motions = motions();
        for (title, description) in [
            ("", "Long enough"),
            ("ab", "Long enough"),
            ("   abc   ", "    "),
            ("Fine title", "four"),
        ] {
            let err = motions.create(title, description).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{title:?}/{description:?}");
        }
        let long_title = "x".repeat(101);
        assert!(motions.create(&long_title, "Long enough").await.is_err());
        let max_title = "x".repeat(100);
        assert!(motions.create(&max_title, "Long enough").await.is_ok());
    }

    #[rocket::async_test]
    async fn unknown_motion_is_not_found() {
        let err = motions().get(Id::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
