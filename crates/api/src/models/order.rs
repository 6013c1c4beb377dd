//! Order domain types and the stock check run before an order is placed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eshop_core::{Email, Money, OrderId, ProductId, UserId};

use super::Product;

/// A placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Customer summary; `None` once the customer's account is deleted.
    pub user: Option<OrderCustomer>,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user_id` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user.as_ref().is_some_and(|u| u.id == user_id)
    }
}

/// The ordering customer, as embedded in order responses.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCustomer {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub email: Email,
}

/// A purchased line. Snapshot of what the customer saw at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// `None` once the product is deleted from the catalog.
    pub product: Option<ProductId>,
    pub name: String,
    pub qty: i32,
    pub image: String,
    pub price: Money,
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Payment provider confirmation, stored verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// A line in a new order request.
///
/// Like cart lines, the product ID may arrive as `product` or `_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    #[serde(default)]
    pub product: Option<ProductId>,
    #[serde(default, rename = "_id")]
    pub id: Option<ProductId>,
    pub name: String,
    pub qty: i32,
    pub image: String,
    pub price: Money,
}

impl OrderItemInput {
    /// The referenced product, whichever key it arrived under.
    #[must_use]
    pub const fn product_id(&self) -> Option<ProductId> {
        match self.product {
            Some(id) => Some(id),
            None => self.id,
        }
    }
}

/// A new order as submitted at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: Money,
}

/// Why a set of order lines cannot be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    /// No lines at all.
    #[error("No order items")]
    Empty,
    /// A line's quantity is zero or negative.
    #[error("Invalid quantity for {name}")]
    InvalidQuantity { name: String },
    /// A line references a product that does not exist.
    #[error("Product not found: {name}")]
    ProductNotFound { name: String },
    /// A line asks for more units than are in stock.
    #[error("Not enough stock for {name}. Only {available} available.")]
    InsufficientStock { name: String, available: i32 },
}

/// Check every line against current catalog stock.
///
/// Lines are checked in order and the first failure is reported, using the
/// line name the customer saw.
///
/// # Errors
///
/// Returns the first [`StockError`] found.
pub fn check_stock(
    items: &[OrderItemInput],
    catalog: &HashMap<ProductId, Product>,
) -> Result<(), StockError> {
    if items.is_empty() {
        return Err(StockError::Empty);
    }

    for item in items {
        if item.qty < 1 {
            return Err(StockError::InvalidQuantity {
                name: item.name.clone(),
            });
        }
        let product = item
            .product_id()
            .and_then(|id| catalog.get(&id))
            .ok_or_else(|| StockError::ProductNotFound {
                name: item.name.clone(),
            })?;
        if product.stock < item.qty {
            return Err(StockError::InsufficientStock {
                name: item.name.clone(),
                available: product.stock,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            user: None,
            name: format!("product-{id}"),
            image: String::new(),
            description: String::new(),
            price: Money::from_minor(1_000),
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(id: i32, name: &str, qty: i32) -> OrderItemInput {
        OrderItemInput {
            product: Some(ProductId::new(id)),
            id: None,
            name: name.to_string(),
            qty,
            image: String::new(),
            price: Money::from_minor(1_000),
        }
    }

    fn catalog() -> HashMap<ProductId, Product> {
        [product(1, 10), product(2, 5)]
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    }

    #[test]
    fn test_check_stock_accepts_exact_stock() {
        assert_eq!(
            check_stock(&[line(1, "Headphones", 10), line(2, "Keyboard", 5)], &catalog()),
            Ok(())
        );
    }

    #[test]
    fn test_check_stock_empty() {
        assert_eq!(check_stock(&[], &catalog()), Err(StockError::Empty));
    }

    #[test]
    fn test_check_stock_reports_first_failure() {
        let err = check_stock(
            &[line(1, "Headphones", 1), line(2, "Keyboard", 6), line(9, "Ghost", 1)],
            &catalog(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not enough stock for Keyboard. Only 5 available."
        );
    }

    #[test]
    fn test_check_stock_missing_product() {
        let err = check_stock(&[line(9, "Ghost", 1)], &catalog()).unwrap_err();
        assert_eq!(err.to_string(), "Product not found: Ghost");

        let no_id = OrderItemInput {
            product: None,
            ..line(1, "Nameless", 1)
        };
        assert!(matches!(
            check_stock(&[no_id], &catalog()),
            Err(StockError::ProductNotFound { .. })
        ));
    }

    #[test]
    fn test_check_stock_rejects_non_positive_quantity() {
        assert!(matches!(
            check_stock(&[line(1, "Headphones", 0)], &catalog()),
            Err(StockError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_order_item_input_reads_id_key() {
        let input: OrderItemInput = serde_json::from_value(serde_json::json!({
            "_id": 2, "name": "Keyboard", "qty": 1, "image": "/k.jpg", "price": 450
        }))
        .unwrap();
        assert_eq!(input.product_id(), Some(ProductId::new(2)));
    }
}
