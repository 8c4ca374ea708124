//! The storage collaborator.
//!
//! The core never holds shared mutable state of its own: every check
//! re-reads the store, and every mutation is a single atomic step offered by
//! one of these methods. Uniqueness of voter identities and of
//! `(motion, voter)` votes is enforced here, at commit time.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    api::pagination::Pagination,
    common::{ExternalId, SessionWindow},
    db::{Motion, NewMotion, NewVote, NewVoter, Vote, Voter},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Shared handle on the store, as placed in managed state.
pub type SharedStore = Arc<dyn VotingStore>;

/// The rules a vote must satisfy to be admitted, evaluated by the store
/// against the motion and voter as they are at commit time.
pub type Admission<'a> = &'a (dyn Fn(&Motion, &Voter) -> Result<()> + Send + Sync);

/// Result of trying to install a session window on a motion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowInstall {
    /// The window was installed; contains the updated motion.
    Installed(Motion),
    /// The motion's current window has not yet closed.
    AlreadyOpen,
    /// No such motion.
    NotFound,
}

/// Result of trying to delete a voter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VoterRemoval {
    Removed,
    HasVotes,
    NotFound,
}

#[rocket::async_trait]
pub trait VotingStore: Send + Sync {
    /// Store a new motion and return it with its ID.
    async fn insert_motion(&self, motion: NewMotion) -> Result<Motion>;

    async fn motion(&self, motion_id: Id) -> Result<Option<Motion>>;

    /// A page of motions in creation order, plus the total count.
    async fn motions(&self, pagination: Pagination) -> Result<(Vec<Motion>, u64)>;

    /// All motions whose window is open at `now`.
    async fn motions_open_at(&self, now: DateTime<Utc>) -> Result<Vec<Motion>>;

    /// Atomically install `window` iff the motion has no window or its
    /// window has closed by `window.opens_at()`.
    async fn install_window(&self, motion_id: Id, window: SessionWindow)
        -> Result<WindowInstall>;

    /// Store a new voter. Fails with `DuplicateIdentity` if the external ID
    /// is taken.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>>;

    async fn voter_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Voter>>;

    /// A page of voters in registration order, plus the total count.
    async fn voters(&self, pagination: Pagination) -> Result<(Vec<Voter>, u64)>;

    /// Set the voter's `active` flag, returning the updated voter.
    async fn set_voter_active(&self, voter_id: Id, active: bool) -> Result<Option<Voter>>;

    /// Replace the voter's external ID, returning the updated voter. Fails
    /// with `DuplicateIdentity` if another voter holds the new ID; setting
    /// the voter's own ID again is not an error.
    async fn update_external_id(
        &self,
        voter_id: Id,
        external_id: ExternalId,
    ) -> Result<Option<Voter>>;

    /// Delete a voter, unless they have cast any vote.
    async fn delete_voter(&self, voter_id: Id) -> Result<VoterRemoval>;

    /// Atomically: load the motion and voter (`NotFound` if either is
    /// missing), run `admit` against them, reject a second vote for the same
    /// pair with `DuplicateVote`, and insert.
    async fn insert_vote(&self, vote: NewVote, admit: Admission<'_>) -> Result<Vote>;

    /// Every committed vote on the motion, in cast order.
    async fn votes_for_motion(&self, motion_id: Id) -> Result<Vec<Vote>>;
}
