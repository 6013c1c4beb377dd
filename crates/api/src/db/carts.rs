//! Server-side cart storage.

use rust_decimal::Decimal;
use sqlx::PgPool;

use eshop_core::{Money, ProductId, UserId};

use super::RepositoryError;
use crate::models::CartItem;

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    name: String,
    image: String,
    price: Decimal,
    qty: i32,
    stock: i32,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            product: ProductId::new(row.product_id),
            name: row.name,
            image: row.image,
            price: Money::new(row.price),
            qty: row.qty,
            stock: row.stock,
        }
    }
}

/// Repository for the `cart_items` table.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's cart in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, name, image, price, qty, stock \
             FROM cart_items WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    /// Replace a user's whole cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, including when a
    /// line references a product that no longer exists.
    pub async fn replace(&self, user_id: UserId, items: &[CartItem]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (position, item) in (0_i32..).zip(items) {
            sqlx::query(
                "INSERT INTO cart_items \
                 (user_id, product_id, position, name, image, price, qty, stock) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(user_id)
            .bind(item.product)
            .bind(position)
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.price.amount())
            .bind(item.qty)
            .bind(item.stock)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Empty a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
