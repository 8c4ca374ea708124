use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{
    common::{Tally, VoteChoice},
    db::{Motion, NewVote, Vote, Voter},
    mongodb::Id,
};
use crate::store::SharedStore;

use super::{Clock, SharedClock};

/// Admits votes and aggregates them.
#[derive(Clone)]
pub struct TallyEngine {
    store: SharedStore,
    clock: SharedClock,
}

impl TallyEngine {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Record the voter's choice on the motion.
    ///
    /// Fails with the first of `NotFound` (motion, then voter),
    /// `Ineligible`, `SessionClosed` and `DuplicateVote` that applies. The
    /// eligibility, session and uniqueness checks run against the stored
    /// state in the same atomic step as the insert.
    pub async fn cast_vote(&self, motion_id: Id, voter_id: Id, choice: VoteChoice) -> Result<Vote> {
        let now = self.clock.now();
        let admit = |motion: &Motion, voter: &Voter| -> Result<()> {
            if !voter.is_eligible() {
                return Err(Error::Ineligible(voter.id));
            }
            if !motion.is_open_at(now) {
                return Err(Error::SessionClosed(motion.id));
            }
            Ok(())
        };
        let new_vote = NewVote {
            motion_id,
            voter_id,
            choice,
            cast_at: now,
        };

        match self.store.insert_vote(new_vote, &admit).await {
            Ok(vote) => {
                info!("Voter {voter_id} voted {choice} on motion {motion_id}");
                Ok(vote)
            }
            Err(
                e @ (Error::Ineligible(_) | Error::SessionClosed(_) | Error::DuplicateVote { .. }),
            ) => {
                warn!("Rejected vote: {e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Current totals for the motion.
    pub async fn tally(&self, motion_id: Id) -> Result<Tally> {
        let votes = self.votes(motion_id).await?;
        Ok(Tally::from_choices(votes.iter().map(|vote| vote.choice)))
    }

    /// Every vote on the motion, in the order they were cast.
    pub async fn votes(&self, motion_id: Id) -> Result<Vec<Vote>> {
        if self.store.motion(motion_id).await?.is_none() {
            return Err(Error::not_found(format!("Motion {motion_id}")));
        }
        self.store.votes_for_motion(motion_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::voting::tests::TestVoting;

    use super::*;

    #[rocket::async_test]
    async fn session_walkthrough() {
        let t = TestVoting::new();
        let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
        let voter = t.registry.register("52998224725").await.unwrap();
        let motion = t.session.open(motion.id, Some(5)).await.unwrap();
        let window = motion.session.unwrap();

        t.clock.set(window.opens_at() + Duration::seconds(1));
        t.tally
            .cast_vote(motion.id, voter.id, VoteChoice::Yes)
            .await
            .unwrap();
        let expected = Tally {
            yes: 1,
            no: 0,
            total: 1,
        };
        assert_eq!(t.tally.tally(motion.id).await.unwrap(), expected);

        let err = t
            .tally
            .cast_vote(motion.id, voter.id, VoteChoice::No)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVote { .. }));

        let inactive = t.registry.register("11144477735").await.unwrap();
        t.registry.set_active(inactive.id, false).await.unwrap();
        let err = t
            .tally
            .cast_vote(motion.id, inactive.id, VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ineligible(_)));

        let late = t.registry.register("39053344705").await.unwrap();
        t.clock.set(window.closes_at() + Duration::seconds(1));
        let err = t
            .tally
            .cast_vote(motion.id, late.id, VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));

        // Failed casts leave the tally untouched, and reading it twice gives
        // the same answer.
        assert_eq!(t.tally.tally(motion.id).await.unwrap(), expected);
        assert_eq!(t.tally.tally(motion.id).await.unwrap(), expected);
    }

    #[rocket::async_test]
    async fn failures_are_reported_in_order() {
        let t = TestVoting::new();
        let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
        let voter = t.registry.register("52998224725").await.unwrap();

        let err = t
            .tally
            .cast_vote(Id::new(), voter.id, VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = t
            .tally
            .cast_vote(motion.id, Id::new(), VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // Ineligibility is reported before the session being closed.
        t.registry.set_active(voter.id, false).await.unwrap();
        let err = t
            .tally
            .cast_vote(motion.id, voter.id, VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ineligible(_)));

        t.registry.set_active(voter.id, true).await.unwrap();
        let err = t
            .tally
            .cast_vote(motion.id, voter.id, VoteChoice::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
    }

    #[rocket::async_test]
    async fn window_boundaries() {
        let t = TestVoting::new();
        let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
        let first = t.registry.register("52998224725").await.unwrap();
        let last = t.registry.register("11144477735").await.unwrap();
        let window = t.session.open(motion.id, Some(1)).await.unwrap().session.unwrap();

        // Open at `opens_at`.
        t.tally
            .cast_vote(motion.id, first.id, VoteChoice::No)
            .await
            .unwrap();
        // Closed at exactly `closes_at`.
        t.clock.set(window.closes_at());
        let err = t
            .tally
            .cast_vote(motion.id, last.id, VoteChoice::No)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
    }

    #[rocket::async_test]
    async fn votes_survive_deactivation_and_reopening() {
        let t = TestVoting::new();
        let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
        let voter = t.registry.register("52998224725").await.unwrap();
        let window = t.session.open(motion.id, Some(1)).await.unwrap().session.unwrap();
        t.tally
            .cast_vote(motion.id, voter.id, VoteChoice::Yes)
            .await
            .unwrap();

        t.registry.set_active(voter.id, false).await.unwrap();
        assert_eq!(t.tally.tally(motion.id).await.unwrap().yes, 1);

        // A fresh window does not grant a second vote.
        t.registry.set_active(voter.id, true).await.unwrap();
        t.clock.set(window.closes_at());
        t.session.open(motion.id, Some(1)).await.unwrap();
        let err = t
            .tally
            .cast_vote(motion.id, voter.id, VoteChoice::No)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVote { .. }));

        let votes = t.tally.votes(motion.id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].choice, VoteChoice::Yes);
    }

    #[rocket::async_test]
    async fn tally_of_unknown_motion_is_not_found() {
        let t = TestVoting::new();
        assert!(matches!(
            t.tally.tally(Id::new()).await,
            Err(Error::NotFound(_))
        ));
        let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
        assert_eq!(t.tally.tally(motion.id).await.unwrap(), Tally::default());
    }

    #[test]
    fn concurrent_casts_admit_exactly_one() {
        const CASTS: usize = 32;

        let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let t = TestVoting::new();
            let motion = t.motions.create("Budget 2025", "Approve the budget.").await.unwrap();
            let voter = t.registry.register("52998224725").await.unwrap();
            t.session.open(motion.id, Some(5)).await.unwrap();

            let handles: Vec<_> = (0..CASTS)
                .map(|i| {
                    let tally = t.tally.clone();
                    let choice = if i % 2 == 0 { VoteChoice::Yes } else { VoteChoice::No };
                    rocket::tokio::spawn(async move {
                        tally.cast_vote(motion.id, voter.id, choice).await
                    })
                })
                .collect();

            let mut successes = 0;
            let mut duplicates = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => successes += 1,
                    Err(Error::DuplicateVote { .. }) => duplicates += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(successes, 1);
            assert_eq!(duplicates, CASTS - 1);
            assert_eq!(t.tally.tally(motion.id).await.unwrap().total, 1);
            assert_eq!(t.store.vote_count(motion.id), 1);
        });
    }
}
