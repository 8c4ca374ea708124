//! Domain types shared between the database, the core and the API.

mod choice;
mod external_id;
mod session;
mod tally;

pub use choice::VoteChoice;
pub use external_id::{check_digits, ExternalId, ExternalIdError, EXTERNAL_ID_LEN};
pub use session::{SessionState, SessionWindow, MAX_SESSION_MINUTES, MIN_SESSION_MINUTES};
pub use tally::Tally;
