use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    common::{ExternalId, SessionWindow},
    db::{Motion, NewMotion, NewVote, NewVoter, Vote, Voter},
    mongodb::Id,
};

use super::{Admission, VoterRemoval, VotingStore, WindowInstall};

/// Rows keyed by `Id`, iterated in insertion order.
struct Table<T> {
    next_seq: u64,
    rows: BTreeMap<u64, T>,
    seq_by_id: HashMap<Id, u64>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            rows: BTreeMap::new(),
            seq_by_id: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, id: Id, row: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_by_id.insert(id, seq);
        self.rows.insert(seq, row);
    }

    fn get(&self, id: &Id) -> Option<&T> {
        self.seq_by_id.get(id).and_then(|seq| self.rows.get(seq))
    }

    fn get_mut(&mut self, id: &Id) -> Option<&mut T> {
        let seq = self.seq_by_id.get(id)?;
        self.rows.get_mut(seq)
    }

    fn remove(&mut self, id: &Id) -> Option<T> {
        let seq = self.seq_by_id.remove(id)?;
        self.rows.remove(&seq)
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Everything the in-memory store holds.
#[derive(Default)]
struct Tables {
    motions: Table<Motion>,
    voters: Table<Voter>,
    /// Unique index on `Voter::external_id`.
    voters_by_external_id: HashMap<ExternalId, Id>,
    votes: Table<Vote>,
    /// Unique index on `(motion_id, voter_id)`.
    ballots_cast: HashSet<(Id, Id)>,
}

/// A store that keeps everything in process memory.
///
/// Every operation takes one lock over all tables, so each method is a
/// single atomic step. Cloning yields another handle on the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the tables half-updated,
    // since every mutation is applied after all checks have passed.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of votes stored for the motion.
    #[cfg(test)]
    pub fn vote_count(&self, motion_id: Id) -> usize {
        self.read()
            .votes
            .values()
            .filter(|vote| vote.motion_id == motion_id)
            .count()
    }
}

fn page<T: Clone>(table: &Table<T>, pagination: Pagination) -> (Vec<T>, u64) {
    let items = table
        .values()
        .skip(pagination.skip() as usize)
        .take(pagination.page_size() as usize)
        .cloned()
        .collect();
    (items, table.len() as u64)
}

#[rocket::async_trait]
impl VotingStore for MemoryStore {
    async fn insert_motion(&self, motion: NewMotion) -> Result<Motion> {
        let motion = Motion {
            id: Id::new(),
            motion,
        };
        self.write().motions.insert(motion.id, motion.clone());
        Ok(motion)
    }

    async fn motion(&self, motion_id: Id) -> Result<Option<Motion>> {
        Ok(self.read().motions.get(&motion_id).cloned())
    }

    async fn motions(&self, pagination: Pagination) -> Result<(Vec<Motion>, u64)> {
        Ok(page(&self.read().motions, pagination))
    }

    async fn motions_open_at(&self, now: DateTime<Utc>) -> Result<Vec<Motion>> {
        Ok(self
            .read()
            .motions
            .values()
            .filter(|motion| motion.is_open_at(now))
            .cloned()
            .collect())
    }

    async fn install_window(
        &self,
        motion_id: Id,
        window: SessionWindow,
    ) -> Result<WindowInstall> {
        let mut tables = self.write();
        let motion = match tables.motions.get_mut(&motion_id) {
            Some(motion) => motion,
            None => return Ok(WindowInstall::NotFound),
        };
        let replaceable = match motion.session {
            Some(current) => current.has_closed_by(window.opens_at()),
            None => true,
        };
        if !replaceable {
            return Ok(WindowInstall::AlreadyOpen);
        }
        motion.motion.session = Some(window);
        Ok(WindowInstall::Installed(motion.clone()))
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut tables = self.write();
        if tables.voters_by_external_id.contains_key(&voter.external_id) {
            return Err(Error::DuplicateIdentity(voter.external_id));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        tables
            .voters_by_external_id
            .insert(voter.external_id.clone(), voter.id);
        tables.voters.insert(voter.id, voter.clone());
        Ok(voter)
    }

    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>> {
        Ok(self.read().voters.get(&voter_id).cloned())
    }

    async fn voter_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Voter>> {
        let tables = self.read();
        Ok(tables
            .voters_by_external_id
            .get(external_id)
            .and_then(|id| tables.voters.get(id))
            .cloned())
    }

    async fn voters(&self, pagination: Pagination) -> Result<(Vec<Voter>, u64)> {
        Ok(page(&self.read().voters, pagination))
    }

    async fn set_voter_active(&self, voter_id: Id, active: bool) -> Result<Option<Voter>> {
        let mut tables = self.write();
        Ok(tables.voters.get_mut(&voter_id).map(|voter| {
            voter.voter.active = active;
            voter.clone()
        }))
    }

    async fn update_external_id(
        &self,
        voter_id: Id,
        external_id: ExternalId,
    ) -> Result<Option<Voter>> {
        let mut tables = self.write();
        let current = match tables.voters.get(&voter_id) {
            Some(voter) => voter.external_id.clone(),
            None => return Ok(None),
        };
        match tables.voters_by_external_id.get(&external_id) {
            Some(holder) if *holder != voter_id => {
                return Err(Error::DuplicateIdentity(external_id));
            }
            _ => {}
        }
        tables.voters_by_external_id.remove(&current);
        tables
            .voters_by_external_id
            .insert(external_id.clone(), voter_id);
        Ok(tables.voters.get_mut(&voter_id).map(|voter| {
            voter.voter.external_id = external_id;
            voter.clone()
        }))
    }

    async fn delete_voter(&self, voter_id: Id) -> Result<VoterRemoval> {
        let mut tables = self.write();
        let votes_cast = match tables.voters.get(&voter_id) {
            Some(voter) => voter.votes_cast,
            None => return Ok(VoterRemoval::NotFound),
        };
        if votes_cast > 0 {
            return Ok(VoterRemoval::HasVotes);
        }
        if let Some(voter) = tables.voters.remove(&voter_id) {
            tables.voters_by_external_id.remove(&voter.external_id);
        }
        Ok(VoterRemoval::Removed)
    }

    async fn insert_vote(&self, vote: NewVote, admit: Admission<'_>) -> Result<Vote> {
        let mut tables = self.write();
        let motion = tables
            .motions
            .get(&vote.motion_id)
            .ok_or_else(|| Error::not_found(format!("Motion {}", vote.motion_id)))?;
        let voter = tables
            .voters
            .get(&vote.voter_id)
            .ok_or_else(|| Error::not_found(format!("Voter {}", vote.voter_id)))?;
        admit(motion, voter)?;

        let key = (vote.motion_id, vote.voter_id);
        if tables.ballots_cast.contains(&key) {
            return Err(Error::DuplicateVote {
                motion_id: vote.motion_id,
                voter_id: vote.voter_id,
            });
        }

        let vote = Vote {
            id: Id::new(),
            vote,
        };
        tables.ballots_cast.insert(key);
        tables.votes.insert(vote.id, vote.clone());
        if let Some(voter) = tables.voters.get_mut(&vote.voter_id) {
            voter.voter.votes_cast += 1;
        }
        Ok(vote)
    }

    async fn votes_for_motion(&self, motion_id: Id) -> Result<Vec<Vote>> {
        Ok(self
            .read()
            .votes
            .values()
            .filter(|vote| vote.motion_id == motion_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::model::common::{ExternalId, VoteChoice};
    use crate::model::db::MotionCore;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn admit_all(_: &Motion, _: &Voter) -> Result<()> {
        Ok(())
    }

    #[rocket::async_test]
    async fn external_ids_are_unique() {
        let store = MemoryStore::new();
        store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap();
        let err = store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));

        let found = store
            .voter_by_external_id(&ExternalId::example())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.external_id, ExternalId::example());
        assert!(store
            .voter_by_external_id(&ExternalId::example2())
            .await
            .unwrap()
            .is_none());
    }

    #[rocket::async_test]
    async fn external_id_updates_keep_the_index_unique() {
        let store = MemoryStore::new();
        let voter = store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap();
        let other = store
            .insert_voter(NewVoter::new(ExternalId::example2(), now()))
            .await
            .unwrap();

        let err = store
            .update_external_id(voter.id, ExternalId::example2())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));

        // Re-setting the voter's own identity is a no-op.
        let same = store
            .update_external_id(other.id, ExternalId::example2())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same.external_id, ExternalId::example2());

        let moved = store
            .update_external_id(voter.id, ExternalId::example3())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.external_id, ExternalId::example3());
        assert!(store
            .voter_by_external_id(&ExternalId::example())
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .voter_by_external_id(&ExternalId::example3())
                .await
                .unwrap()
                .map(|v| v.id),
            Some(voter.id)
        );
        // The old identity is free for someone else.
        store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap();

        assert!(store
            .update_external_id(Id::new(), ExternalId::random())
            .await
            .unwrap()
            .is_none());
    }

    #[rocket::async_test]
    async fn window_replaced_only_after_close() {
        let store = MemoryStore::new();
        let motion = store.insert_motion(MotionCore::example(now())).await.unwrap();

        let first = SessionWindow::starting_at(now(), 5).unwrap();
        assert!(matches!(
            store.install_window(motion.id, first).await.unwrap(),
            WindowInstall::Installed(_)
        ));

        let early = SessionWindow::starting_at(now() + Duration::minutes(4), 5).unwrap();
        assert_eq!(
            store.install_window(motion.id, early).await.unwrap(),
            WindowInstall::AlreadyOpen
        );

        let later = SessionWindow::starting_at(first.closes_at(), 5).unwrap();
        match store.install_window(motion.id, later).await.unwrap() {
            WindowInstall::Installed(motion) => assert_eq!(motion.session, Some(later)),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            store.install_window(Id::new(), later).await.unwrap(),
            WindowInstall::NotFound
        );
    }

    #[rocket::async_test]
    async fn votes_block_voter_deletion() {
        let store = MemoryStore::new();
        let motion = store.insert_motion(MotionCore::example(now())).await.unwrap();
        let voter = store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap();
        let idle = store
            .insert_voter(NewVoter::new(ExternalId::example2(), now()))
            .await
            .unwrap();

        let vote = NewVote {
            motion_id: motion.id,
            voter_id: voter.id,
            choice: VoteChoice::Yes,
            cast_at: now(),
        };
        store.insert_vote(vote.clone(), &admit_all).await.unwrap();
        let err = store.insert_vote(vote, &admit_all).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateVote { .. }));
        assert_eq!(store.vote_count(motion.id), 1);

        assert_eq!(
            store.delete_voter(voter.id).await.unwrap(),
            VoterRemoval::HasVotes
        );
        assert_eq!(
            store.delete_voter(idle.id).await.unwrap(),
            VoterRemoval::Removed
        );
        assert_eq!(
            store.delete_voter(idle.id).await.unwrap(),
            VoterRemoval::NotFound
        );
        // The identity is free again once its voter is gone.
        store
            .insert_voter(NewVoter::new(ExternalId::example2(), now()))
            .await
            .unwrap();
    }

    #[rocket::async_test]
    async fn rejected_admission_inserts_nothing() {
        let store = MemoryStore::new();
        let motion = store.insert_motion(MotionCore::example(now())).await.unwrap();
        let voter = store
            .insert_voter(NewVoter::new(ExternalId::example(), now()))
            .await
            .unwrap();
        let vote = NewVote {
            motion_id: motion.id,
            voter_id: voter.id,
            choice: VoteChoice::No,
            cast_at: now(),
        };
        let reject = |motion: &Motion, _: &Voter| -> Result<()> { Err(Error::SessionClosed(motion.id)) };
        let err = store.insert_vote(vote, &reject).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
        assert_eq!(store.vote_count(motion.id), 0);
        assert_eq!(store.voter(voter.id).await.unwrap().unwrap().votes_cast, 0);
    }

    #[test]
    fn tables_iterate_in_insertion_order() {
        let mut ids: Vec<Id> = (0..4).map(|_| Id::new()).collect();
        ids.sort();
        ids.reverse();
        let mut table = Table::default();
        for (n, id) in ids.iter().enumerate() {
            table.insert(*id, n);
        }
        assert_eq!(table.values().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        assert_eq!(table.remove(&ids[1]), Some(1));
        table.insert(ids[1], 4);
        assert_eq!(table.values().copied().collect::<Vec<_>>(), vec![0, 2, 3, 4]);
        assert_eq!(table.get(&ids[1]), Some(&4));
        assert_eq!(table.len(), 4);
    }

    #[rocket::async_test]
    async fn pages_in_creation_order() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(store.insert_motion(MotionCore::example(now())).await.unwrap().id);
        }
        let (page, total) = store
            .motions(Pagination::new(2, 2, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(|m| m.id).collect::<Vec<_>>(),
            ids[2..4].to_vec()
        );
    }
}
