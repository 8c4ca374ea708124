#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod store;
pub mod voting;

pub use config::Config;

use config::{ConfigFairing, StoreFairing};
use logging::LoggerFairing;
use store::SharedStore;
use voting::{SessionFinalizerFairing, SharedClock, SystemClock, VotingFairing};

/// Build the server: the store is chosen from configuration and time comes
/// from the system clock.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .manage::<SharedClock>(Arc::new(SystemClock))
        .attach(VotingFairing)
        .attach(SessionFinalizerFairing)
}

/// Build the server over an existing store and clock.
pub fn rocket_for_store_and_clock(store: SharedStore, clock: SharedClock) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .manage(clock)
        .attach(VotingFairing)
        .attach(SessionFinalizerFairing)
}
