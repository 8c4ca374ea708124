use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::{
    bson::{self, doc, DateTime as BsonDateTime, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    common::{ExternalId, SessionWindow},
    db::{Motion, NewMotion, NewVote, NewVoter, Vote, Voter},
    mongodb::{
        ensure_indexes_exist, is_duplicate_key_error, is_transient_transaction_error, Coll, Id,
    },
};

use super::{Admission, VoterRemoval, VotingStore, WindowInstall};

/// How many times a vote transaction is attempted before a write conflict
/// is reported to the caller.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// A store backed by MongoDB.
///
/// Vote admission runs in a multi-document transaction, so the server must
/// be a replica set (a single-node replica set is fine).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    motions: Coll<Motion>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
}

impl MongoStore {
    /// Connect to the server, select the named database and make sure the
    /// unique indexes exist.
    pub async fn connect(db_uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        info!("Using MongoDB database {db_name}");
        Ok(Self::from_db(client, &db))
    }

    /// Wrap an existing connection. Does not create indexes.
    pub fn from_db(client: Client, db: &Database) -> Self {
        Self {
            client,
            motions: Coll::from_db(db),
            voters: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Page through a collection in creation order. `ObjectId`s only order
    /// by the second, so the timestamp field leads the sort.
    fn page_options(created_field: &str, pagination: Pagination) -> FindOptions {
        let mut sort = Document::new();
        sort.insert(created_field, 1);
        sort.insert("_id", 1);
        FindOptions::builder()
            .sort(sort)
            .skip(pagination.skip())
            .limit(i64::from(pagination.page_size()))
            .build()
    }

    /// The body of the vote transaction. The voter document is updated
    /// rather than just read, so that any concurrent status change or
    /// deletion conflicts with this transaction instead of interleaving.
    async fn admit_vote(
        &self,
        vote: &Vote,
        admit: Admission<'_>,
        session: &mut ClientSession,
    ) -> Result<()> {
        let motion = self
            .motions
            .find_one_with_session(vote.motion_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Motion {}", vote.motion_id)))?;
        let update = doc! {
            "$inc": { "votes_cast": 1 },
        };
        let voter = self
            .voters
            .find_one_and_update_with_session(vote.voter_id.as_doc(), update, None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {}", vote.voter_id)))?;

        admit(&motion, &voter)?;

        match self.votes.insert_one_with_session(vote, None, session).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateVote {
                motion_id: vote.motion_id,
                voter_id: vote.voter_id,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn bson_window(window: &SessionWindow) -> Result<bson::Bson> {
    bson::to_bson(window).map_err(|e| Error::Internal(format!("Cannot encode window: {e}")))
}

#[rocket::async_trait]
impl VotingStore for MongoStore {
    async fn insert_motion(&self, motion: NewMotion) -> Result<Motion> {
        let motion = Motion {
            id: Id::new(),
            motion,
        };
        self.motions.insert_one(&motion, None).await?;
        Ok(motion)
    }

    async fn motion(&self, motion_id: Id) -> Result<Option<Motion>> {
        Ok(self.motions.find_one(motion_id.as_doc(), None).await?)
    }

    async fn motions(&self, pagination: Pagination) -> Result<(Vec<Motion>, u64)> {
        let items = self
            .motions
            .find(None, Self::page_options("created_at", pagination))
            .await?
            .try_collect()
            .await?;
        let total = self.motions.count_documents(None, None).await?;
        Ok((items, total))
    }

    async fn motions_open_at(&self, now: DateTime<Utc>) -> Result<Vec<Motion>> {
        let now = BsonDateTime::from_chrono(now);
        let filter = doc! {
            "session.opens_at": { "$lte": now },
            "session.closes_at": { "$gt": now },
        };
        Ok(self.motions.find(filter, None).await?.try_collect().await?)
    }

    async fn install_window(
        &self,
        motion_id: Id,
        window: SessionWindow,
    ) -> Result<WindowInstall> {
        let filter = doc! {
            "_id": motion_id,
            "$or": [
                { "session": null },
                { "session.closes_at": { "$lte": BsonDateTime::from_chrono(window.opens_at()) } },
            ],
        };
        let update = doc! {
            "$set": { "session": bson_window(&window)? },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        if let Some(motion) = self
            .motions
            .find_one_and_update(filter, update, options)
            .await?
        {
            return Ok(WindowInstall::Installed(motion));
        }

        // Nothing matched: either there is no such motion or its window is live.
        let exists = self
            .motions
            .count_documents(motion_id.as_doc(), None)
            .await?
            > 0;
        Ok(if exists {
            WindowInstall::AlreadyOpen
        } else {
            WindowInstall::NotFound
        })
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        match self.voters.insert_one(&voter, None).await {
            Ok(_) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => {
                Err(Error::DuplicateIdentity(voter.voter.external_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(voter_id.as_doc(), None).await?)
    }

    async fn voter_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Voter>> {
        let filter = doc! {
            "external_id": external_id.as_str(),
        };
        Ok(self.voters.find_one(filter, None).await?)
    }

    async fn voters(&self, pagination: Pagination) -> Result<(Vec<Voter>, u64)> {
        let items = self
            .voters
            .find(None, Self::page_options("registered_at", pagination))
            .await?
            .try_collect()
            .await?;
        let total = self.voters.count_documents(None, None).await?;
        Ok((items, total))
    }

    async fn set_voter_active(&self, voter_id: Id, active: bool) -> Result<Option<Voter>> {
        let update = doc! {
            "$set": { "active": active },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .voters
            .find_one_and_update(voter_id.as_doc(), update, options)
            .await?)
    }

    async fn update_external_id(
        &self,
        voter_id: Id,
        external_id: ExternalId,
    ) -> Result<Option<Voter>> {
        let update = doc! {
            "$set": { "external_id": external_id.as_str() },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        match self
            .voters
            .find_one_and_update(voter_id.as_doc(), update, options)
            .await
        {
            Ok(voter) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateIdentity(external_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_voter(&self, voter_id: Id) -> Result<VoterRemoval> {
        let mut filter: Document = voter_id.as_doc();
        filter.insert("votes_cast", 0_i64);
        let result = self.voters.delete_one(filter, None).await?;
        if result.deleted_count == 1 {
            return Ok(VoterRemoval::Removed);
        }
        let exists = self.voters.count_documents(voter_id.as_doc(), None).await? > 0;
        Ok(if exists {
            VoterRemoval::HasVotes
        } else {
            VoterRemoval::NotFound
        })
    }

    async fn insert_vote(&self, vote: NewVote, admit: Admission<'_>) -> Result<Vote> {
        let vote = Vote {
            id: Id::new(),
            vote,
        };
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let result = match self.admit_vote(&vote, admit, &mut session).await {
                Ok(()) => session.commit_transaction().await.map_err(Error::from),
                Err(e) => {
                    // The server may already have aborted; nothing to report either way.
                    let _ = session.abort_transaction().await;
                    Err(e)
                }
            };
            match result {
                Ok(()) => return Ok(vote),
                Err(Error::Db(ref e))
                    if is_transient_transaction_error(e) && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    debug!(
                        "Vote transaction for motion {} voter {} conflicted (attempt {attempt}), retrying",
                        vote.motion_id, vote.voter_id
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn votes_for_motion(&self, motion_id: Id) -> Result<Vec<Vote>> {
        let filter = doc! {
            "motion_id": motion_id,
        };
        let options = FindOptions::builder()
            .sort(doc! {"cast_at": 1, "_id": 1})
            .build();
        Ok(self.votes.find(filter, options).await?.try_collect().await?)
    }
}
