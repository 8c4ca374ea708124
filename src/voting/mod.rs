//! The voting core: voter registry, motions, session lifecycle and tally.
//!
//! Every service is a cheap handle over the shared store and clock; none
//! keeps state of its own beyond the scheduled finalizers.

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

use crate::store::SharedStore;
use crate::Config;

mod clock;
mod finalizer;
mod motions;
mod registry;
mod session;
mod tally;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use finalizer::{SessionFinalizerFairing, SessionFinalizers};
pub use motions::MotionStore;
pub use registry::VoterRegistry;
pub use session::VotingSession;
pub use tally::TallyEngine;

/// A fairing that builds the voting services over the managed
/// `SharedStore` and `SharedClock` and places each into managed state.
pub struct VotingFairing;

#[rocket::async_trait]
impl Fairing for VotingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voting services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (store, clock, default_minutes) = match (
            rocket.state::<SharedStore>(),
            rocket.state::<SharedClock>(),
            rocket.state::<Config>(),
        ) {
            (Some(store), Some(clock), Some(config)) => {
                (store.clone(), clock.clone(), config.default_session_minutes())
            }
            _ => {
                error!("Config, store and clock must be managed before the voting services");
                return Err(rocket);
            }
        };

        let tally = TallyEngine::new(store.clone(), clock.clone());
        let finalizers = SessionFinalizers::new(tally.clone(), clock.clone());
        let session = VotingSession::new(
            store.clone(),
            clock.clone(),
            default_minutes,
            finalizers.clone(),
        );
        info!("Voting services ready, default session length {default_minutes} minutes");

        Ok(rocket
            .manage(MotionStore::new(store.clone(), clock.clone()))
            .manage(VoterRegistry::new(store, clock))
            .manage(session)
            .manage(tally)
            .manage(finalizers))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::store::MemoryStore;

    use super::*;

    /// Every service wired over one `MemoryStore` and `ManualClock`.
    pub struct TestVoting {
        pub store: MemoryStore,
        pub clock: ManualClock,
        pub motions: MotionStore,
        pub registry: VoterRegistry,
        pub session: VotingSession,
        pub tally: TallyEngine,
        pub finalizers: SessionFinalizers,
    }

    impl TestVoting {
        pub const DEFAULT_MINUTES: i64 = 1;

        pub fn new() -> Self {
            let store = MemoryStore::new();
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
            let shared_store: SharedStore = Arc::new(store.clone());
            let shared_clock: SharedClock = Arc::new(clock.clone());

            let tally = TallyEngine::new(shared_store.clone(), shared_clock.clone());
            let finalizers = SessionFinalizers::new(tally.clone(), shared_clock.clone());
            Self {
                motions: MotionStore::new(shared_store.clone(), shared_clock.clone()),
                registry: VoterRegistry::new(shared_store.clone(), shared_clock.clone()),
                session: VotingSession::new(
                    shared_store,
                    shared_clock,
                    Self::DEFAULT_MINUTES,
                    finalizers.clone(),
                ),
                tally,
                finalizers,
                store,
                clock,
            }
        }

        pub fn shared_store(&self) -> SharedStore {
            Arc::new(self.store.clone())
        }

        pub fn shared_clock(&self) -> SharedClock {
            Arc::new(self.clock.clone())
        }
    }
}
