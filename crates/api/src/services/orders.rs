//! Order placement.
//!
//! Validates the requested lines against current stock, saves the order,
//! decrements stock line by line and empties the customer's cart. These steps
//! are not wrapped in one transaction, so two concurrent checkouts of a
//! low-stock product can both pass the stock check.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;

use eshop_core::{Money, UserId};

use crate::db::{CartRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::order::{OrderItemInput, StockError, check_stock};
use crate::models::{NewOrder, Order, OrderItem, ShippingAddress};

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested lines cannot be fulfilled.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A checkout request.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: Money,
}

/// Order placement service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    products: ProductRepository<'a>,
    carts: CartRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            products: ProductRepository::new(pool),
            carts: CartRepository::new(pool),
        }
    }

    /// Place an order for `user_id`.
    ///
    /// The submitted total is stored as sent.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Stock` if a line is empty, unknown or over stock.
    /// Returns `OrderError::Repository` if a database operation fails.
    pub async fn place(&self, user_id: UserId, request: PlaceOrder) -> Result<Order, OrderError> {
        if request.items.is_empty() {
            return Err(StockError::Empty.into());
        }

        let ids: Vec<_> = request
            .items
            .iter()
            .filter_map(OrderItemInput::product_id)
            .collect();
        let catalog: HashMap<_, _> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        check_stock(&request.items, &catalog)?;

        let items: Vec<OrderItem> = request
            .items
            .iter()
            .map(|item| OrderItem {
                product: item.product_id(),
                name: item.name.clone(),
                qty: item.qty,
                image: item.image.clone(),
                price: item.price,
            })
            .collect();

        let order = self
            .orders
            .create(&NewOrder {
                user_id,
                items,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
                total_price: request.total_price,
            })
            .await?;

        for item in &order.order_items {
            if let Some(product_id) = item.product {
                self.products.decrement_stock(product_id, item.qty).await?;
            }
        }

        self.carts.clear(user_id).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            lines = order.order_items.len(),
            total = %order.total_price,
            "Order placed"
        );

        Ok(order)
    }
}
