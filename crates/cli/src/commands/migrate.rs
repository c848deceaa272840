//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! np-cart migrate
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` - `PostgreSQL` connection string for the cart API
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Cart API migrations: `crates/api/migrations/`

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

/// Errors from running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run cart API database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if no database is configured, the connection
/// fails, or a migration fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();

    let database_url = database_url(|key| std::env::var(key).ok())
        .ok_or(MigrationError::MissingEnvVar("API_DATABASE_URL"))?;

    tracing::info!("Connecting to cart database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running cart migrations...");
    newofyou_api::MIGRATOR.run(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}

fn database_url(lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    lookup("API_DATABASE_URL")
        .or_else(|| lookup("DATABASE_URL"))
        .filter(|url| !url.is_empty())
        .map(SecretString::from)
}
