//! Cart persistence.
//!
//! # Backends
//!
//! - [`MemoryCartRepository`] - process-local, used when no database is configured
//! - [`PgCartRepository`] - `PostgreSQL`
//!
//! ## Tables (schema `cart`)
//!
//! - `cart.items` - one row per `(user_id, product_id)` line
//! - `cart.merges` - merge tokens already applied, per user
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p newofyou-cli -- migrate
//! ```

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use newofyou_core::{
    CartDocument, CartLine, MergeToken, ProductId, Quantity, QuantityError, UserId,
    ZeroQuantityPolicy,
};

pub use memory::MemoryCartRepository;
pub use postgres::PgCartRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The change would break a cart quantity rule.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),
}

/// Storage for server-side carts.
///
/// Every mutation returns the user's complete cart after the change. A user
/// with no stored lines has an empty cart, never a missing one.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Fetch a user's cart.
    async fn get(&self, user_id: &UserId) -> Result<CartDocument, RepositoryError>;

    /// Add units of a product, summing into an existing line.
    ///
    /// Returns `RepositoryError::InvalidQuantity` if the line would exceed
    /// `Quantity::MAX`; the cart is unchanged.
    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartDocument, RepositoryError>;

    /// Set the quantity of an existing line. Zero follows `zero`.
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
        zero: ZeroQuantityPolicy,
    ) -> Result<CartDocument, RepositoryError>;

    /// Remove a line. Removing an absent line leaves the cart unchanged.
    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartDocument, RepositoryError>;

    /// Sum `lines` into the user's cart. Line sums past `Quantity::MAX` are
    /// clamped, never refused.
    ///
    /// With a token the merge is applied at most once per `(user, token)`;
    /// a repeat returns `false` and changes nothing. Without a token it is
    /// always applied.
    async fn merge(
        &self,
        user_id: &UserId,
        token: Option<MergeToken>,
        lines: &[CartLine],
    ) -> Result<bool, RepositoryError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
