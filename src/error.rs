use log::error;
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::{ExternalId, ExternalIdError},
    mongodb::Id,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an operation can fail. Each variant is a deterministic
/// function of the stored state and the input, except `Db` and `Internal`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid session duration {0}; must be between 1 and 60 minutes")]
    InvalidDuration(String),
    #[error("Invalid vote choice {0:?}; expected YES or NO")]
    InvalidChoice(String),
    #[error("Invalid identity {raw:?}: {reason}")]
    InvalidIdentity {
        raw: String,
        reason: ExternalIdError,
    },
    #[error("Identity {0} is already registered")]
    DuplicateIdentity(ExternalId),
    #[error("Voter {0} is not eligible to vote")]
    Ineligible(Id),
    #[error("Voting session for motion {0} is not open")]
    SessionClosed(Id),
    #[error("Voting session for motion {0} is already open")]
    AlreadyOpen(Id),
    #[error("Voter {voter_id} has already voted on motion {motion_id}")]
    DuplicateVote { motion_id: Id, voter_id: Id },
    #[error("Voter {0} has cast votes and cannot be deleted")]
    VoterHasVotes(Id),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a `NotFound` naming the missing thing.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable, machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) => "StoreUnavailable",
            Self::NotFound(_) => "NotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::InvalidDuration(_) => "InvalidDuration",
            Self::InvalidChoice(_) => "InvalidChoice",
            Self::InvalidIdentity { .. } => "InvalidIdentity",
            Self::DuplicateIdentity(_) => "DuplicateIdentity",
            Self::Ineligible(_) => "Ineligible",
            Self::SessionClosed(_) => "SessionClosed",
            Self::AlreadyOpen(_) => "AlreadyOpen",
            Self::DuplicateVote { .. } => "DuplicateVote",
            Self::VoterHasVotes(_) => "VoterHasVotes",
            Self::Internal(_) => "Internal",
        }
    }

    /// HTTP status reported for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidInput(_)
            | Self::InvalidDuration(_)
            | Self::InvalidChoice(_)
            | Self::InvalidIdentity { .. }
            | Self::SessionClosed(_) => Status::BadRequest,
            Self::Ineligible(_) => Status::Forbidden,
            Self::DuplicateIdentity(_)
            | Self::AlreadyOpen(_)
            | Self::DuplicateVote { .. }
            | Self::VoterHasVotes(_) => Status::Conflict,
            Self::Db(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }
}

/// JSON body sent alongside an error status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        }
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let id = Id::new();
        assert_eq!(Error::not_found("Motion").status(), Status::NotFound);
        assert_eq!(Error::InvalidDuration("0".to_string()).status(), Status::BadRequest);
        assert_eq!(Error::Ineligible(id).status(), Status::Forbidden);
        assert_eq!(Error::SessionClosed(id).status(), Status::BadRequest);
        assert_eq!(
            Error::DuplicateVote {
                motion_id: id,
                voter_id: id
            }
            .status(),
            Status::Conflict
        );
        assert_eq!(
            Error::Internal("boom".to_string()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            Error::InvalidChoice("MAYBE".to_string()).to_string(),
            "Invalid vote choice \"MAYBE\"; expected YES or NO"
        );
        assert_eq!(Error::AlreadyOpen(Id::new()).kind(), "AlreadyOpen");
    }
}
