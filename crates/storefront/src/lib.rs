//! New of You storefront cart library.
//!
//! The shopping client's cart: the [`CartStore`] holding the current cart,
//! the [`CartSession`] that binds it to a guest or authenticated session and
//! merges the guest cart at login, device-local [`storage`] and the HTTP
//! client for the cart API ([`remote`]).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use newofyou_core::{ProductId, UserId};
//! use newofyou_storefront::{CartSession, CartStore, ClientConfig, FileStorage, HttpCartClient};
//!
//! let config = ClientConfig::from_env()?;
//! let store = CartStore::load(
//!     FileStorage::open(config.storage_dir.clone())?,
//!     HttpCartClient::new(&config.api)?,
//!     config.zero_quantity_policy,
//! )?;
//! let mut session = CartSession::new(store);
//!
//! session.add_line(ProductId::new("P1"), 2).await?;
//! session.login(UserId::new("u1")).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod remote;
pub mod storage;

pub use cart::{CartSession, CartStore, MergeOutcome};
pub use config::{ClientConfig, ConfigError, RemoteConfig};
pub use error::{CartError, Result};
pub use remote::{HttpCartClient, RemoteCart, RemoteError};
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError, keys};
