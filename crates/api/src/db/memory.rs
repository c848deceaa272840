//! In-memory cart repository.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use newofyou_core::{
    CartDocument, CartLine, CartSnapshot, MergeToken, ProductId, Quantity, UserId,
    ZeroQuantityPolicy,
};

use super::{CartRepository, RepositoryError};

#[derive(Debug, Default)]
struct StoredCart {
    items: CartSnapshot,
    updated_at: Option<DateTime<Utc>>,
}

impl StoredCart {
    fn document(&self, user_id: &UserId) -> CartDocument {
        CartDocument {
            user_id: user_id.clone(),
            items: self.items.clone(),
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[derive(Debug, Default)]
struct State {
    carts: HashMap<UserId, StoredCart>,
    merges: HashSet<(UserId, MergeToken)>,
}

/// Carts held in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCartRepository {
    state: Mutex<State>,
}

impl MemoryCartRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for MemoryCartRepository {
    async fn get(&self, user_id: &UserId) -> Result<CartDocument, RepositoryError> {
        let state = self.state.lock().await;
        Ok(match state.carts.get(user_id) {
            Some(cart) => cart.document(user_id),
            None => StoredCart::default().document(user_id),
        })
    }

    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartDocument, RepositoryError> {
        let mut state = self.state.lock().await;
        let cart = state.carts.entry(user_id.clone()).or_default();
        cart.items.add(product_id.clone(), quantity)?;
        cart.touch();
        Ok(cart.document(user_id))
    }

    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
        zero: ZeroQuantityPolicy,
    ) -> Result<CartDocument, RepositoryError> {
        let mut state = self.state.lock().await;
        let cart = state
            .carts
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound)?;

        let changed = if quantity == 0 && zero == ZeroQuantityPolicy::Remove {
            cart.items.remove(product_id)
        } else {
            cart.items.set_quantity(product_id, quantity)
        };
        if !changed {
            return Err(RepositoryError::NotFound);
        }
        cart.touch();
        Ok(cart.document(user_id))
    }

    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartDocument, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(cart) = state.carts.get_mut(user_id) else {
            return Ok(StoredCart::default().document(user_id));
        };
        if cart.items.remove(product_id) {
            cart.touch();
        }
        Ok(cart.document(user_id))
    }

    async fn merge(
        &self,
        user_id: &UserId,
        token: Option<MergeToken>,
        lines: &[CartLine],
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(token) = token
            && !state.merges.insert((user_id.clone(), token))
        {
            return Ok(false);
        }

        let guest: CartSnapshot = lines.iter().cloned().collect();
        let cart = state.carts.entry(user_id.clone()).or_default();
        cart.items.absorb(&guest);
        cart.touch();
        Ok(true)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
