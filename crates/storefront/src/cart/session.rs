//! Persistence Bridge.
//!
//! [`CartSession`] records the session context for a [`CartStore`] and runs
//! the login merge that folds a guest cart into the user's server cart.
//!
//! # Merge protocol
//!
//! 1. Read the durable guest cart. If it is empty, fetch the server cart and stop.
//! 2. Pick a merge token. A pending record under `cart_merge` is reused when it
//!    covers the same user and the same lines, otherwise a new token is
//!    written there before anything is sent.
//! 3. Send the guest lines with the token. The server applies a token at most
//!    once, so resending after an uncertain failure cannot double quantities.
//! 4. Delete `cart`, then `cart_merge`, then fetch and adopt the server cart.
//!
//! A failure in steps 1-3 leaves both records in place and the in-memory
//! snapshot on the guest cart; the error is [`CartError::MergeFailed`].
//!
//! While a merge is pending, every authenticated cart operation runs it again
//! first and fails with `MergeFailed` if it still cannot complete. The server
//! cart is never shown or changed without the guest lines folded in.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use newofyou_core::{CartSnapshot, MergeToken, ProductId, SessionContext, UserId};

use super::store::{CartStore, read_snapshot};
use crate::error::{CartError, Result};
use crate::remote::RemoteCart;
use crate::storage::{LocalStorage, StorageError, keys};

/// Result of a login merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The guest cart was empty; the server cart was fetched as-is.
    Skipped,
    /// Guest lines were folded into the server cart.
    Merged {
        /// Number of guest lines sent.
        lines: usize,
    },
}

/// Merge token recorded before the merge request is sent.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingMerge {
    user_id: UserId,
    token: MergeToken,
    lines: CartSnapshot,
}

/// A cart store bound to the current session.
pub struct CartSession<L, R> {
    store: CartStore<L, R>,
    context: SessionContext,
}

impl<L: LocalStorage, R: RemoteCart> CartSession<L, R> {
    /// Start a guest session over `store`.
    #[must_use]
    pub fn new(store: CartStore<L, R>) -> Self {
        Self::with_context(store, SessionContext::guest())
    }

    /// Resume a session in a known context without merging.
    #[must_use]
    pub const fn with_context(store: CartStore<L, R>, context: SessionContext) -> Self {
        Self { store, context }
    }

    /// The current session context.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The underlying cart store.
    #[must_use]
    pub const fn store(&self) -> &CartStore<L, R> {
        &self.store
    }

    /// Record the session context. Does not merge or fetch.
    pub fn set_session_mode(&mut self, context: SessionContext) {
        debug!(mode = %context.mode(), "Session mode set");
        self.context = context;
    }

    /// See [`CartStore::add_line`]. A pending guest cart merge is finished first.
    ///
    /// # Errors
    ///
    /// `MergeFailed` if a pending merge still cannot complete, otherwise the
    /// same as [`CartStore::add_line`].
    pub async fn add_line(&self, product_id: ProductId, quantity: i64) -> Result<CartSnapshot> {
        self.settle_pending_merge().await?;
        self.store.add_line(&self.context, product_id, quantity).await
    }

    /// See [`CartStore::update_line_quantity`]. A pending guest cart merge is finished first.
    ///
    /// # Errors
    ///
    /// `MergeFailed` if a pending merge still cannot complete, otherwise the
    /// same as [`CartStore::update_line_quantity`].
    pub async fn update_line_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        self.settle_pending_merge().await?;
        self.store
            .update_line_quantity(&self.context, product_id, quantity)
            .await
    }

    /// See [`CartStore::remove_line`]. A pending guest cart merge is finished first.
    ///
    /// # Errors
    ///
    /// `MergeFailed` if a pending merge still cannot complete, otherwise the
    /// same as [`CartStore::remove_line`].
    pub async fn remove_line(&self, product_id: &ProductId) -> Result<CartSnapshot> {
        self.settle_pending_merge().await?;
        self.store.remove_line(&self.context, product_id).await
    }

    /// See [`CartStore::refresh`]. A pending guest cart merge is finished first.
    ///
    /// # Errors
    ///
    /// `MergeFailed` if a pending merge still cannot complete, otherwise the
    /// same as [`CartStore::refresh`].
    pub async fn refresh(&self) -> Result<CartSnapshot> {
        self.settle_pending_merge().await?;
        self.store.refresh(&self.context).await
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> CartSnapshot {
        self.store.snapshot().await
    }

    /// Number of distinct lines.
    pub async fn line_count(&self) -> usize {
        self.store.line_count().await
    }

    /// Total units across all lines.
    pub async fn total_quantity(&self) -> u64 {
        self.store.total_quantity().await
    }

    /// Switch to the authenticated session for `user_id` and merge the guest cart.
    ///
    /// The session stays authenticated when the merge fails; call
    /// [`Self::retry_merge`] to try again.
    ///
    /// # Errors
    ///
    /// - `MergeFailed` if the guest cart could not be read or sent
    /// - `RemoteUnavailable` if the merge went through but the server cart
    ///   could not be fetched afterwards
    #[instrument(skip(self))]
    pub async fn login(&mut self, user_id: UserId) -> Result<MergeOutcome> {
        self.set_session_mode(SessionContext::authenticated(user_id.clone()));
        self.merge_guest_cart(&user_id).await
    }

    /// Run the merge again for the authenticated user. A guest session has
    /// nothing to merge into and returns [`MergeOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`].
    #[instrument(skip(self))]
    pub async fn retry_merge(&mut self) -> Result<MergeOutcome> {
        let Some(user_id) = self.context.user_id().cloned() else {
            debug!("No authenticated user, nothing to merge");
            return Ok(MergeOutcome::Skipped);
        };
        self.merge_guest_cart(&user_id).await
    }

    /// Switch back to a guest session.
    ///
    /// The in-memory cart is reset to the durable guest cart, which is empty
    /// unless a merge never completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` or `Corrupted` if the guest cart cannot be
    /// read; the session is unchanged in that case.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<CartSnapshot> {
        let mut current = self.store.lock().await;
        let guest = read_snapshot(self.store.local())?.unwrap_or_default();
        current.clone_from(&guest);
        drop(current);

        self.set_session_mode(SessionContext::guest());
        info!(lines = guest.line_count(), "Logged out");
        Ok(guest)
    }

    /// Whether an authenticated session still has an unmerged guest cart on
    /// the device.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` or `Corrupted` if the guest cart cannot be read.
    pub fn has_pending_merge(&self) -> Result<bool> {
        if self.context.user_id().is_none() {
            return Ok(false);
        }
        Ok(read_snapshot(self.store.local())?.is_some_and(|cart| !cart.is_empty()))
    }

    async fn settle_pending_merge(&self) -> Result<()> {
        let Some(user_id) = self.context.user_id() else {
            return Ok(());
        };
        if !self.has_pending_merge().map_err(CartError::merge_failed)? {
            return Ok(());
        }
        info!(%user_id, "Finishing pending guest cart merge");
        self.merge_guest_cart(user_id).await?;
        Ok(())
    }

    async fn merge_guest_cart(&self, user_id: &UserId) -> Result<MergeOutcome> {
        let mut current = self.store.lock().await;
        let local = self.store.local();
        let remote = self.store.remote();

        let guest = read_snapshot(local)
            .map_err(CartError::merge_failed)?
            .unwrap_or_default();

        if guest.is_empty() {
            let server = remote.fetch(user_id).await?;
            current.clone_from(&server);
            debug!(lines = server.line_count(), "Guest cart empty, adopted server cart");
            return Ok(MergeOutcome::Skipped);
        }

        let token = pending_token(local, user_id, &guest).map_err(CartError::merge_failed)?;
        remote
            .merge(user_id, guest.lines(), token)
            .await
            .map_err(|e| {
                warn!(error = %e, %token, "Guest cart merge failed");
                CartError::merge_failed(e)
            })?;
        info!(%token, lines = guest.line_count(), "Guest cart merged");

        clear_merged(local);

        let server = remote.fetch(user_id).await?;
        current.clone_from(&server);
        Ok(MergeOutcome::Merged {
            lines: guest.line_count(),
        })
    }
}

/// Reuse the recorded token for the same user and lines, or record a new one.
fn pending_token(
    local: &impl LocalStorage,
    user_id: &UserId,
    guest: &CartSnapshot,
) -> Result<MergeToken> {
    if let Some(value) = local.get(keys::PENDING_MERGE)? {
        match serde_json::from_value::<PendingMerge>(value) {
            Ok(pending) if pending.user_id == *user_id && pending.lines.same_lines(guest) => {
                debug!(token = %pending.token, "Reusing pending merge token");
                return Ok(pending.token);
            }
            Ok(_) => debug!("Pending merge covers other lines, replacing it"),
            Err(e) => warn!(error = %e, "Discarding unreadable pending merge record"),
        }
    }

    let pending = PendingMerge {
        user_id: user_id.clone(),
        token: MergeToken::generate(),
        lines: guest.clone(),
    };
    let value = serde_json::to_value(&pending).map_err(StorageError::from)?;
    local.set(keys::PENDING_MERGE, &value)?;
    Ok(pending.token)
}

/// Drop the guest cart and then the pending token. The token is kept while
/// the cart is still on the device so a later merge resends it.
fn clear_merged(local: &impl LocalStorage) {
    if let Err(e) = local.delete(keys::CART) {
        warn!(error = %e, "Merged guest cart could not be cleared; merge token kept");
        return;
    }
    if let Err(e) = local.delete(keys::PENDING_MERGE) {
        warn!(error = %e, "Pending merge record could not be cleared");
    }
}
