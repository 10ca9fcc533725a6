//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite connection and migrations
//! - User store (GitHub identity and upstream tokens)
//! - Session store (hashed refresh secrets)

mod database;
mod models;
mod sessions;
mod users;

pub use database::Database;
pub use models::*;
pub use sessions::is_refresh_hash;

#[cfg(test)]
mod database_test;
