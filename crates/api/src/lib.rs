//! New of You cart API.
//!
//! The server side of the storefront cart: a JSON REST API over a
//! [`db::CartRepository`]. The binary in `main.rs` adds configuration,
//! logging, Sentry and CORS around [`routes::router`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, ConfigError};
pub use state::AppState;

/// Embedded database migrations from `crates/api/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
