//! `PostgreSQL` cart repository.
//!
//! Queries are checked at runtime so the crate builds without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use newofyou_core::{
    CartDocument, CartLine, CartSnapshot, MergeToken, ProductId, Quantity, QuantityError, UserId,
    ZeroQuantityPolicy,
};

use super::{CartRepository, RepositoryError};

/// Carts stored in the `cart` schema.
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: &UserId,
    ) -> Result<CartDocument, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT product_id, quantity, updated_at
            FROM cart.items
            WHERE user_id = $1
            ORDER BY created_at, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut updated_at: Option<DateTime<Utc>> = None;
        for row in rows {
            let product_id: ProductId = row.try_get("product_id")?;
            let quantity: i32 = row.try_get("quantity")?;
            let quantity = u32::try_from(quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!(
                    "negative quantity {quantity} for product {product_id}"
                ))
            })?;
            let row_updated: DateTime<Utc> = row.try_get("updated_at")?;
            updated_at = updated_at.max(Some(row_updated));
            lines.push(CartLine {
                product_id,
                quantity,
            });
        }

        Ok(CartDocument {
            user_id: user_id.clone(),
            items: CartSnapshot::from_lines(lines),
            updated_at,
        })
    }

    /// Sum `quantity` into a line, creating it if needed. The sum is clamped
    /// to `Quantity::MAX`.
    async fn upsert_merge(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart.items (user_id, product_id, quantity)
            VALUES ($1, $2, LEAST($3, $4))
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = LEAST(cart.items.quantity + EXCLUDED.quantity, $4),
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(line_quantity(quantity))
        .bind(line_quantity(Quantity::MAX))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// A line quantity as a Postgres `INTEGER`.
fn line_quantity(quantity: u32) -> i32 {
    i32::try_from(quantity.min(Quantity::MAX)).unwrap_or(i32::MAX)
}

#[async_trait]
impl CartRepository for PgCartRepository {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &UserId) -> Result<CartDocument, RepositoryError> {
        Self::load(&self.pool, user_id).await
    }

    #[instrument(skip(self))]
    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartDocument, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let added = sqlx::query(
            r"
            INSERT INTO cart.items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = cart.items.quantity + EXCLUDED.quantity,
                updated_at = now()
            WHERE cart.items.quantity + EXCLUDED.quantity <= $4
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(line_quantity(quantity.get()))
        .bind(line_quantity(Quantity::MAX))
        .execute(&mut *tx)
        .await?;

        if added.rows_affected() == 0 {
            let current: i32 = sqlx::query_scalar(
                "SELECT quantity FROM cart.items WHERE user_id = $1 AND product_id = $2",
            )
            .bind(user_id)
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
            return Err(QuantityError::LineLimit {
                current: u32::try_from(current).unwrap_or_default(),
                added: quantity.get(),
                max: Quantity::MAX,
            }
            .into());
        }

        let doc = Self::load(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(doc)
    }

    #[instrument(skip(self))]
    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
        zero: ZeroQuantityPolicy,
    ) -> Result<CartDocument, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = if quantity == 0 && zero == ZeroQuantityPolicy::Remove {
            sqlx::query("DELETE FROM cart.items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?
        } else {
            sqlx::query(
                r"
                UPDATE cart.items
                SET quantity = $3, updated_at = now()
                WHERE user_id = $1 AND product_id = $2
                ",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(line_quantity(quantity))
            .execute(&mut *tx)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let doc = Self::load(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(doc)
    }

    #[instrument(skip(self))]
    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartDocument, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart.items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        let doc = Self::load(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(doc)
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn merge(
        &self,
        user_id: &UserId,
        token: Option<MergeToken>,
        lines: &[CartLine],
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(token) = token {
            let recorded = sqlx::query(
                r"
                INSERT INTO cart.merges (user_id, merge_token)
                VALUES ($1, $2)
                ON CONFLICT (user_id, merge_token) DO NOTHING
                ",
            )
            .bind(user_id)
            .bind(token.as_uuid())
            .execute(&mut *tx)
            .await?;

            if recorded.rows_affected() == 0 {
                debug!(%token, "Merge token already applied");
                return Ok(false);
            }
        }

        let guest: CartSnapshot = lines.iter().cloned().collect();
        for line in guest.lines().iter().filter(|l| l.quantity > 0) {
            Self::upsert_merge(&mut tx, user_id, &line.product_id, line.quantity).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
