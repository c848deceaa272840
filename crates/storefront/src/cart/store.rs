//! Cart Store.
//!
//! Holds "the current cart" for one session and applies mutations to it. The
//! session context is passed into every operation: guest contexts mutate the
//! local snapshot and overwrite the durable `cart` record, authenticated
//! contexts call the cart API and adopt whatever snapshot the server returns.
//!
//! Mutations are single-flight. Each one holds the cart lock until its
//! storage write or remote call settles, so concurrent callers queue in FIFO
//! order instead of racing on a stale snapshot.

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};

use newofyou_core::{
    CartSnapshot, ProductId, Quantity, QuantityError, SessionContext, ZeroQuantityPolicy,
};

use crate::error::{CartError, Result};
use crate::remote::RemoteCart;
use crate::storage::{LocalStorage, StorageError, keys};

/// The cart for one session.
pub struct CartStore<L, R> {
    local: L,
    remote: R,
    policy: ZeroQuantityPolicy,
    current: Mutex<CartSnapshot>,
}

impl<L: LocalStorage, R: RemoteCart> CartStore<L, R> {
    /// Create a store, initialized from the durable guest cart if one exists.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StorageUnavailable` if local storage cannot be read
    /// and `CartError::Corrupted` if the stored cart does not decode.
    pub fn load(local: L, remote: R, policy: ZeroQuantityPolicy) -> Result<Self> {
        let snapshot = read_snapshot(&local)?.unwrap_or_default();
        debug!(lines = snapshot.line_count(), "Cart store initialized");
        Ok(Self {
            local,
            remote,
            policy,
            current: Mutex::new(snapshot),
        })
    }

    /// The current snapshot, once any in-flight mutation has settled.
    pub async fn snapshot(&self) -> CartSnapshot {
        self.current.lock().await.clone()
    }

    /// Number of distinct lines in the current snapshot.
    pub async fn line_count(&self) -> usize {
        self.current.lock().await.line_count()
    }

    /// Total units across all lines (the cart badge).
    pub async fn total_quantity(&self) -> u64 {
        self.current.lock().await.total_quantity()
    }

    /// The zero-quantity policy applied by `update_line_quantity`.
    #[must_use]
    pub const fn policy(&self) -> ZeroQuantityPolicy {
        self.policy
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity` is not a positive integer, or the
    ///   guest line would exceed [`Quantity::MAX`]
    /// - `StorageUnavailable` if the guest cart cannot be written
    /// - `RemoteUnavailable` if the authenticated call fails
    ///
    /// The current snapshot is unchanged on error.
    #[instrument(skip(self, session), fields(mode = %session.mode()))]
    pub async fn add_line(
        &self,
        session: &SessionContext,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        let quantity = Quantity::new(quantity)?;
        let mut current = self.current.lock().await;

        match session.user_id() {
            None => {
                let mut next = current.clone();
                next.add(product_id, quantity)?;
                self.commit_guest(&mut current, next)
            }
            Some(user_id) => {
                let next = self.remote.add_line(user_id, &product_id, quantity).await?;
                Ok(adopt(&mut current, next))
            }
        }
    }

    /// Set the quantity of an existing line.
    ///
    /// Zero follows the store's [`ZeroQuantityPolicy`]. Updating a product
    /// that is not in a guest cart changes nothing but still rewrites the
    /// durable record.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity` is negative or too large
    /// - `StorageUnavailable` if the guest cart cannot be written
    /// - `RemoteUnavailable` if the authenticated call fails
    #[instrument(skip(self, session), fields(mode = %session.mode()))]
    pub async fn update_line_quantity(
        &self,
        session: &SessionContext,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        let quantity = line_quantity(quantity)?;
        let remove = quantity == 0 && self.policy == ZeroQuantityPolicy::Remove;
        let mut current = self.current.lock().await;

        match session.user_id() {
            None => {
                let mut next = current.clone();
                if remove {
                    next.remove(&product_id);
                } else if !next.set_quantity(&product_id, quantity) {
                    debug!(%product_id, "Update for product not in guest cart");
                }
                self.commit_guest(&mut current, next)
            }
            Some(user_id) => {
                let next = if remove {
                    self.remote.remove_line(user_id, &product_id).await?
                } else {
                    self.remote
                        .set_line_quantity(user_id, &product_id, quantity)
                        .await?
                };
                Ok(adopt(&mut current, next))
            }
        }
    }

    /// Remove a product's line. Removing an absent product is a no-op.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the guest cart cannot be written
    /// - `RemoteUnavailable` if the authenticated call fails
    #[instrument(skip(self, session), fields(mode = %session.mode()))]
    pub async fn remove_line(
        &self,
        session: &SessionContext,
        product_id: &ProductId,
    ) -> Result<CartSnapshot> {
        let mut current = self.current.lock().await;

        match session.user_id() {
            None => {
                let mut next = current.clone();
                next.remove(product_id);
                self.commit_guest(&mut current, next)
            }
            Some(user_id) => {
                let next = self.remote.remove_line(user_id, product_id).await?;
                Ok(adopt(&mut current, next))
            }
        }
    }

    /// Reload the current snapshot from its authoritative source: the durable
    /// guest record, or the server for an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns the storage or remote error; the snapshot is unchanged on error.
    #[instrument(skip(self, session), fields(mode = %session.mode()))]
    pub async fn refresh(&self, session: &SessionContext) -> Result<CartSnapshot> {
        let mut current = self.current.lock().await;

        let next = match session.user_id() {
            None => read_snapshot(&self.local)?.unwrap_or_default(),
            Some(user_id) => self.remote.fetch(user_id).await?,
        };
        Ok(adopt(&mut current, next))
    }

    /// Write a guest snapshot through to durable storage, then adopt it.
    fn commit_guest(
        &self,
        current: &mut CartSnapshot,
        next: CartSnapshot,
    ) -> Result<CartSnapshot> {
        write_snapshot(&self.local, &next).inspect_err(|e| {
            warn!(error = %e, "Failed to persist guest cart");
        })?;
        Ok(adopt(current, next))
    }

    /// Take the cart lock for a multi-step operation (the login merge).
    pub(crate) async fn lock(&self) -> MutexGuard<'_, CartSnapshot> {
        self.current.lock().await
    }

    pub(crate) const fn local(&self) -> &L {
        &self.local
    }

    pub(crate) const fn remote(&self) -> &R {
        &self.remote
    }
}

/// Replace the current snapshot wholesale.
fn adopt(current: &mut CartSnapshot, next: CartSnapshot) -> CartSnapshot {
    current.clone_from(&next);
    next
}

/// Validate an update quantity: zero is allowed, negatives are not.
fn line_quantity(quantity: i64) -> std::result::Result<u32, QuantityError> {
    if quantity == 0 {
        return Ok(0);
    }
    Quantity::new(quantity).map(Quantity::get)
}

/// Read the durable guest cart.
pub(crate) fn read_snapshot(local: &impl LocalStorage) -> Result<Option<CartSnapshot>> {
    let Some(value) = local.get(keys::CART)? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| CartError::Corrupted {
            key: keys::CART,
            reason: e.to_string(),
        })
}

/// Overwrite the durable guest cart.
fn write_snapshot(local: &impl LocalStorage, snapshot: &CartSnapshot) -> Result<()> {
    let value = serde_json::to_value(snapshot).map_err(StorageError::from)?;
    local.set(keys::CART, &value)?;
    Ok(())
}
