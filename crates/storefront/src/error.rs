//! Cart error type.
//!
//! Mutation errors reach the caller unchanged, and the in-memory cart is
//! never modified when an operation fails. Merge failures are reported as
//! [`CartError::MergeFailed`] so the login flow can tell them apart from a
//! failed add/update/remove.

use thiserror::Error;

use newofyou_core::QuantityError;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Errors returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The requested quantity is not a valid line quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// An authenticated-mode call to the cart API failed.
    #[error("remote cart unavailable: {0}")]
    RemoteUnavailable(#[from] RemoteError),

    /// Device-local storage could not be read or written.
    #[error("local cart storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// A stored record exists but does not decode.
    #[error("stored cart record '{key}' is corrupted: {reason}")]
    Corrupted {
        /// Storage key of the record.
        key: &'static str,
        /// Decode error.
        reason: String,
    },

    /// Folding the guest cart into the server cart at login failed. The
    /// guest cart is still in local storage and the merge can be retried.
    #[error("guest cart merge failed: {0}")]
    MergeFailed(#[source] Box<CartError>),
}

impl CartError {
    /// Wrap an error raised while merging.
    #[must_use]
    pub fn merge_failed(cause: impl Into<Self>) -> Self {
        Self::MergeFailed(Box::new(cause.into()))
    }

    /// Whether this error came from the login merge.
    #[must_use]
    pub const fn is_merge_failure(&self) -> bool {
        matches!(self, Self::MergeFailed(_))
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteUnavailable(e) => e.is_transient(),
            Self::StorageUnavailable(e) => {
                matches!(e, StorageError::Unavailable | StorageError::Io(_))
            }
            Self::MergeFailed(cause) => cause.is_retryable(),
            Self::InvalidQuantity(_) | Self::Corrupted { .. } => false,
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
