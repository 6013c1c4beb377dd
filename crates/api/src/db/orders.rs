//! Order repository.
//!
//! Orders are read with a `LEFT JOIN` on `users` for the customer summary;
//! their lines are loaded in a second query for the whole batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use eshop_core::{Email, Money, OrderId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderCustomer, OrderItem, PaymentResult, ShippingAddress};

const ORDER_SELECT: &str = "SELECT o.id, o.user_id, u.username, u.email, \
     o.shipping_address, o.shipping_city, o.shipping_postal_code, o.shipping_country, \
     o.payment_method, o.total_price, o.is_paid, o.paid_at, \
     o.payment_result_id, o.payment_result_status, o.payment_result_updated, \
     o.is_delivered, o.delivered_at, o.created_at, o.updated_at \
     FROM orders o LEFT JOIN users u ON u.id = o.user_id";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    username: Option<String>,
    email: Option<String>,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    shipping_country: Option<String>,
    payment_method: String,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_result_id: Option<String>,
    payment_result_status: Option<String>,
    payment_result_updated: Option<String>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: Option<i32>,
    name: String,
    image: String,
    price: Decimal,
    qty: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product: row.product_id.map(ProductId::new),
            name: row.name,
            qty: row.qty,
            image: row.image,
            price: Money::new(row.price),
        }
    }
}

impl OrderRow {
    fn into_order(self, order_items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let user = match (self.user_id, self.username, self.email) {
            (Some(id), Some(username), Some(email)) => Some(OrderCustomer {
                id: UserId::new(id),
                username,
                email: Email::parse(&email).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
                })?,
            }),
            _ => None,
        };

        let payment_result = if self.payment_result_id.is_some()
            || self.payment_result_status.is_some()
            || self.payment_result_updated.is_some()
        {
            Some(PaymentResult {
                id: self.payment_result_id,
                status: self.payment_result_status,
                update_time: self.payment_result_updated,
            })
        } else {
            None
        };

        Ok(Order {
            id: OrderId::new(self.id),
            user,
            order_items,
            shipping_address: ShippingAddress {
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
                country: self.shipping_country,
            },
            payment_method: self.payment_method,
            total_price: Money::new(self.total_price),
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            payment_result,
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for the `orders` and `order_items` tables.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, name, image, price, qty \
             FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items_by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(item.into());
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn fetch_where(
        &self,
        condition: &str,
        bind: Option<i32>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("{ORDER_SELECT} {condition}");
        let mut query = sqlx::query_as::<_, OrderRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(self.pool).await?;

        self.attach_items(rows).await
    }

    /// Save an order and its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_id: i32 = sqlx::query_scalar(
            "INSERT INTO orders \
             (user_id, shipping_address, shipping_city, shipping_postal_code, shipping_country, \
              payment_method, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(order.user_id)
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(order.shipping_address.country.as_deref())
        .bind(&order.payment_method)
        .bind(order.total_price.amount())
        .fetch_one(&mut *tx)
        .await?;

        for (position, item) in (0_i32..).zip(&order.items) {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, position, name, image, price, qty) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(order_id)
            .bind(item.product)
            .bind(position)
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.price.amount())
            .bind(item.qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_by_id(OrderId::new(order_id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .fetch_where("WHERE o.id = $1", Some(id.as_i32()))
            .await?
            .into_iter()
            .next())
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_where("ORDER BY o.created_at DESC, o.id DESC", None)
            .await
    }

    /// One customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_where(
            "WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC",
            Some(user_id.as_i32()),
        )
        .await
    }

    /// Whether a customer has any order not yet delivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_undelivered(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE user_id = $1 AND NOT is_delivered)",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        result: &PaymentResult,
    ) -> Result<Order, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE orders \
             SET is_paid = TRUE, paid_at = NOW(), \
                 payment_result_id = $2, payment_result_status = $3, payment_result_updated = $4, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(result.id.as_deref())
        .bind(result.status.as_deref())
        .bind(result.update_time.as_deref())
        .execute(self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Mark an order delivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_delivered(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE orders \
             SET is_delivered = TRUE, delivered_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}
