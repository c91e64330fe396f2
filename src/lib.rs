#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::store::Store;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod store;

/// Build the server, backed by the MongoDB configured in `Rocket.toml`.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}

/// Build the server around an existing store, skipping the database
/// connection entirely.
pub fn rocket_for_store(store: Store) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
}
