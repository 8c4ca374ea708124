use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Paginated, Pagination},
    common::ExternalId,
    db::{NewVoter, Voter},
    mongodb::Id,
};
use crate::store::{SharedStore, VoterRemoval};

use super::{Clock, SharedClock};

/// Voter identities and their eligibility.
#[derive(Clone)]
pub struct VoterRegistry {
    store: SharedStore,
    clock: SharedClock,
}

impl VoterRegistry {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Register a new, active voter. Punctuation in `raw_external_id` is
    /// ignored.
    pub async fn register(&self, raw_external_id: &str) -> Result<Voter> {
        let external_id = parse_external_id(raw_external_id)?;
        let new_voter = NewVoter::new(external_id, self.clock.now());
        match self.store.insert_voter(new_voter).await {
            Ok(voter) => {
                info!("Registered voter {}", voter.id);
                Ok(voter)
            }
            Err(e @ Error::DuplicateIdentity(_)) => {
                warn!("{e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Give the voter a new identity number. The number is validated before
    /// the voter is looked up.
    pub async fn change_identity(&self, voter_id: Id, raw_external_id: &str) -> Result<Voter> {
        let external_id = parse_external_id(raw_external_id)?;
        match self.store.update_external_id(voter_id, external_id).await {
            Ok(Some(voter)) => {
                info!("Voter {voter_id} now has identity {}", voter.external_id);
                Ok(voter)
            }
            Ok(None) => Err(voter_not_found(voter_id)),
            Err(e @ Error::DuplicateIdentity(_)) => {
                warn!("{e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Make the voter eligible or ineligible. Setting the current value
    /// again is not an error.
    pub async fn set_active(&self, voter_id: Id, active: bool) -> Result<Voter> {
        let voter = self
            .store
            .set_voter_active(voter_id, active)
            .await?
            .ok_or_else(|| voter_not_found(voter_id))?;
        info!("Voter {voter_id} is now {}", if active { "active" } else { "inactive" });
        Ok(voter)
    }

    /// Does the voter exist and are they active?
    pub async fn is_eligible(&self, voter_id: Id) -> Result<bool> {
        Ok(self.voter(voter_id).await?.is_eligible())
    }

    pub async fn voter(&self, voter_id: Id) -> Result<Voter> {
        self.store
            .voter(voter_id)
            .await?
            .ok_or_else(|| voter_not_found(voter_id))
    }

    /// Look a voter up by their (possibly punctuated) identity number.
    pub async fn voter_by_external_id(&self, raw_external_id: &str) -> Result<Voter> {
        let external_id = parse_external_id(raw_external_id)?;
        self.store
            .voter_by_external_id(&external_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with identity {external_id}")))
    }

    pub async fn voters(&self, pagination: Pagination) -> Result<Paginated<Voter>> {
        let (voters, total) = self.store.voters(pagination).await?;
        Ok(pagination.paginate(total, voters))
    }

    /// Delete a voter who has never voted.
    pub async fn remove(&self, voter_id: Id) -> Result<()> {
        match self.store.delete_voter(voter_id).await? {
            VoterRemoval::Removed => {
                info!("Deleted voter {voter_id}");
                Ok(())
            }
            VoterRemoval::HasVotes => {
                warn!("Refused to delete voter {voter_id}, who has cast votes");
                Err(Error::VoterHasVotes(voter_id))
            }
            VoterRemoval::NotFound => Err(voter_not_found(voter_id)),
        }
    }
}

fn parse_external_id(raw: &str) -> Result<ExternalId> {
    ExternalId::parse(raw).map_err(|reason| {
        warn!("Rejected identity {raw:?}: {reason}");
        Error::InvalidIdentity {
            raw: raw.to_string(),
            reason,
        }
    })
}

fn voter_not_found(voter_id: Id) -> Error {
    Error::not_found(format!("Voter {voter_id}"))
}
