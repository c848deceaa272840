//! Application state shared across handlers.

use std::sync::Arc;

use newofyou_core::ZeroQuantityPolicy;

use crate::db::CartRepository;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cart repository and the cart rules the server enforces.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    carts: Arc<dyn CartRepository>,
    zero_quantity_policy: ZeroQuantityPolicy,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `carts` - Cart repository (in-memory or `PostgreSQL`)
    /// * `zero_quantity_policy` - What updating a line to zero does
    #[must_use]
    pub fn new(carts: Arc<dyn CartRepository>, zero_quantity_policy: ZeroQuantityPolicy) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                carts,
                zero_quantity_policy,
            }),
        }
    }

    /// Get a reference to the cart repository.
    #[must_use]
    pub fn carts(&self) -> &dyn CartRepository {
        self.inner.carts.as_ref()
    }

    /// Get the zero-quantity policy.
    #[must_use]
    pub fn zero_quantity_policy(&self) -> ZeroQuantityPolicy {
        self.inner.zero_quantity_policy
    }
}
