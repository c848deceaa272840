//! Local durable storage for the device.
//!
//! A key-value store of JSON documents scoped to one device. Guest carts live
//! here until the first successful login merges them into the server cart.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - in-process map (tests, ephemeral sessions)
//! - [`FileStorage`] - one JSON file per key under a directory (CLI)

mod file;
mod memory;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage keys used by the cart.
pub mod keys {
    /// Key for the guest cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the merge token and lines of a merge that has not been confirmed.
    pub const PENDING_MERGE: &str = "cart_merge";

    /// Key for the session context recorded by the CLI between invocations.
    pub const SESSION: &str = "session";
}

/// Errors from a local storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded as JSON.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The key contains characters the backend cannot store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Storage is disabled or otherwise inaccessible.
    #[error("storage unavailable")]
    Unavailable,
}

/// Device-scoped key-value storage of JSON documents.
///
/// Writes replace the whole record for a key; there is no partial update.
///
/// Calls are synchronous and run on the calling task, under the cart lock
/// when made by [`CartStore`](crate::CartStore). That fits a single-task
/// client such as the CLI. A backend that can block for long, such as
/// [`FileStorage`] on a slow disk, should do its I/O inside
/// [`tokio::task::block_in_place`] or move to a dedicated thread when the
/// cart is shared by many tasks of a server runtime.
pub trait LocalStorage: Send + Sync {
    /// Read the record for `key`, or `None` if it was never written or was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Overwrite the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Delete the record for `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: LocalStorage + ?Sized> LocalStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }
}

/// Reject keys that cannot be used as a file name on every platform.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_owned()))
    }
}
