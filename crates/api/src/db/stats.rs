//! Dashboard aggregates.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use eshop_core::Money;

use super::RepositoryError;

/// Headline numbers shown on the CRM dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    /// Sum of `total_price` over paid orders.
    pub total_sales: Money,
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    total_users: i64,
    total_products: i64,
    total_orders: i64,
    total_sales: Decimal,
}

/// Read-only aggregate queries.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute dashboard totals in a single round trip.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT \
                (SELECT COUNT(*) FROM users) AS total_users, \
                (SELECT COUNT(*) FROM products) AS total_products, \
                (SELECT COUNT(*) FROM orders) AS total_orders, \
                (SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE is_paid) AS total_sales",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardStats {
            total_users: row.total_users,
            total_products: row.total_products,
            total_orders: row.total_orders,
            total_sales: Money::new(row.total_sales),
        })
    }
}
