use std::sync::Arc;

use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::common::{MAX_SESSION_MINUTES, MIN_SESSION_MINUTES};
use crate::store::{MemoryStore, MongoStore, SharedStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_session_minutes")]
    default_session_minutes: i64,
    #[serde(default = "default_max_page_size")]
    max_page_size: u32,
}

fn default_session_minutes() -> i64 {
    1
}

fn default_max_page_size() -> u32 {
    100
}

impl Config {
    /// Session length used when an open request does not give one.
    pub fn default_session_minutes(&self) -> i64 {
        self.default_session_minutes
    }

    /// Largest `page_size` a listing accepts.
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    fn validate(&self) -> Result<(), String> {
        if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&self.default_session_minutes) {
            return Err(format!(
                "`default_session_minutes` must be between {MIN_SESSION_MINUTES} and {MAX_SESSION_MINUTES}, found {}",
                self.default_session_minutes
            ));
        }
        if self.max_page_size == 0 {
            return Err("`max_page_size` must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_session_minutes: default_session_minutes(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = config.validate() {
            error!("Invalid application config: {e}");
            return Err(rocket);
        }

        Ok(rocket.manage(config))
    }
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // secret
    db_uri: Option<String>,
}

/// A fairing that picks the store and places it into managed state as a
/// `SharedStore`: MongoDB when `db_uri` is configured, otherwise an
/// in-memory store.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: SharedStore = match config.db_uri {
            Some(db_uri) => {
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &get_database_name()).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured; using an in-memory store, data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(rocket.manage(store))
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "pauta".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_session_minutes(), 1);
        assert_eq!(config.max_page_size(), 100);
    }

    #[test]
    fn values_are_validated() {
        let config: Config = Figment::from(Serialized::default("default_session_minutes", 61))
            .extract()
            .unwrap();
        assert!(config.validate().is_err());

        let config: Config = Figment::from(Serialized::default("max_page_size", 0))
            .extract()
            .unwrap();
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }
}
