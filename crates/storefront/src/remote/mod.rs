//! Remote cart resource.
//!
//! The server owns the cart of an authenticated user. Every call returns the
//! server's complete snapshot (except `merge`, after which the caller
//! re-fetches), and the store adopts that snapshot verbatim.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use newofyou_core::{CartLine, CartSnapshot, MergeToken, ProductId, Quantity, UserId};

pub use http::HttpCartClient;

/// Errors from the remote cart resource.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request could not complete (network failure, timeout, 5xx),
    /// including after the configured retry.
    #[error("cart API unreachable: {0}")]
    Unavailable(String),

    /// The server refused the request.
    #[error("cart API rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the response envelope, or the raw body.
        message: String,
    },

    /// The server answered with a body that is not a cart response.
    #[error("unreadable cart API response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Operations the server exposes on a user's cart.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// Fetch the user's cart.
    async fn fetch(&self, user_id: &UserId) -> Result<CartSnapshot, RemoteError>;

    /// Add units of a product; the server sums into an existing line.
    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Set the quantity of an existing line.
    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Remove a line; removing an absent line succeeds.
    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Fold guest lines into the user's cart. The server applies a given
    /// `token` at most once.
    async fn merge(
        &self,
        user_id: &UserId,
        lines: &[CartLine],
        token: MergeToken,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteCart + ?Sized> RemoteCart for Arc<T> {
    async fn fetch(&self, user_id: &UserId) -> Result<CartSnapshot, RemoteError> {
        (**self).fetch(user_id).await
    }

    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, RemoteError> {
        (**self).add_line(user_id, product_id, quantity).await
    }

    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        (**self).set_line_quantity(user_id, product_id, quantity).await
    }

    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError> {
        (**self).remove_line(user_id, product_id).await
    }

    async fn merge(
        &self,
        user_id: &UserId,
        lines: &[CartLine],
        token: MergeToken,
    ) -> Result<(), RemoteError> {
        (**self).merge(user_id, lines, token).await
    }
}

/// In-memory stand-in for the cart API used by unit tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use newofyou_core::ZeroQuantityPolicy;

    use super::*;

    #[derive(Default)]
    struct State {
        carts: HashMap<UserId, CartSnapshot>,
        applied_tokens: HashSet<(UserId, MergeToken)>,
    }

    type Hook = Box<dyn FnOnce() + Send>;

    /// Server double with the same semantics as the real cart API.
    pub struct FakeRemote {
        state: Mutex<State>,
        policy: ZeroQuantityPolicy,
        offline: AtomicBool,
        fail_merge_after_apply: AtomicBool,
        fail_fetch: AtomicBool,
        after_merge: Mutex<Option<Hook>>,
        merge_calls: AtomicUsize,
        delay: Mutex<Option<Duration>>,
    }

    impl FakeRemote {
        pub fn new(policy: ZeroQuantityPolicy) -> Self {
            Self {
                state: Mutex::new(State::default()),
                policy,
                offline: AtomicBool::new(false),
                fail_merge_after_apply: AtomicBool::new(false),
                fail_fetch: AtomicBool::new(false),
                after_merge: Mutex::new(None),
                merge_calls: AtomicUsize::new(0),
                delay: Mutex::new(None),
            }
        }

        pub fn seed(&self, user_id: &UserId, cart: CartSnapshot) {
            self.state
                .lock()
                .unwrap()
                .carts
                .insert(user_id.clone(), cart);
        }

        pub fn cart(&self, user_id: &UserId) -> CartSnapshot {
            self.state
                .lock()
                .unwrap()
                .carts
                .get(user_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Apply the next merges, then report a failure as if the response was lost.
        pub fn set_fail_merge_after_apply(&self, fail: bool) {
            self.fail_merge_after_apply.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_fetch(&self, fail: bool) {
            self.fail_fetch.store(fail, Ordering::SeqCst);
        }

        /// Run `hook` once, right after the next merge is applied.
        pub fn set_after_merge(&self, hook: impl FnOnce() + Send + 'static) {
            *self.after_merge.lock().unwrap() = Some(Box::new(hook));
        }

        pub fn merge_calls(&self) -> usize {
            self.merge_calls.load(Ordering::SeqCst)
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        async fn enter(&self) -> Result<(), RemoteError> {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.offline.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("connection refused".to_owned()));
            }
            Ok(())
        }

        fn with_cart(
            &self,
            user_id: &UserId,
            f: impl FnOnce(&mut CartSnapshot),
        ) -> CartSnapshot {
            let mut state = self.state.lock().unwrap();
            let cart = state.carts.entry(user_id.clone()).or_default();
            f(cart);
            cart.clone()
        }
    }

    #[async_trait]
    impl RemoteCart for FakeRemote {
        async fn fetch(&self, user_id: &UserId) -> Result<CartSnapshot, RemoteError> {
            self.enter().await?;
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("fetch timed out".to_owned()));
            }
            Ok(self.cart(user_id))
        }

        async fn add_line(
            &self,
            user_id: &UserId,
            product_id: &ProductId,
            quantity: Quantity,
        ) -> Result<CartSnapshot, RemoteError> {
            self.enter().await?;
            let mut cart = self.cart(user_id);
            cart.add(product_id.clone(), quantity)
                .map_err(|e| RemoteError::Rejected {
                    status: 400,
                    message: e.to_string(),
                })?;
            self.seed(user_id, cart.clone());
            Ok(cart)
        }

        async fn set_line_quantity(
            &self,
            user_id: &UserId,
            product_id: &ProductId,
            quantity: u32,
        ) -> Result<CartSnapshot, RemoteError> {
            self.enter().await?;
            if self.cart(user_id).line(product_id).is_none() {
                return Err(RemoteError::Rejected {
                    status: 404,
                    message: "Cart item not present".to_owned(),
                });
            }
            let policy = self.policy;
            Ok(self.with_cart(user_id, |cart| {
                if quantity == 0 && policy == ZeroQuantityPolicy::Remove {
                    cart.remove(product_id);
                } else {
                    cart.set_quantity(product_id, quantity);
                }
            }))
        }

        async fn remove_line(
            &self,
            user_id: &UserId,
            product_id: &ProductId,
        ) -> Result<CartSnapshot, RemoteError> {
            self.enter().await?;
            Ok(self.with_cart(user_id, |cart| {
                cart.remove(product_id);
            }))
        }

        async fn merge(
            &self,
            user_id: &UserId,
            lines: &[CartLine],
            token: MergeToken,
        ) -> Result<(), RemoteError> {
            self.merge_calls.fetch_add(1, Ordering::SeqCst);
            self.enter().await?;
            {
                let mut state = self.state.lock().unwrap();
                if state.applied_tokens.insert((user_id.clone(), token)) {
                    let guest = CartSnapshot::from_lines(lines.iter().cloned());
                    state
                        .carts
                        .entry(user_id.clone())
                        .or_default()
                        .absorb(&guest);
                }
            }
            let hook = self.after_merge.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            if self.fail_merge_after_apply.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("response lost".to_owned()));
            }
            Ok(())
        }
    }
}
