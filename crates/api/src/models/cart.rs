//! Shopping cart types and the guest-cart merge performed at login.
//!
//! Guests keep their cart in the browser. When they log in, the storefront
//! sends that cart along with the credentials and it is folded into the cart
//! stored on the account.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use eshop_core::{Money, ProductId};

use super::Product;

/// A line in an account's cart.
///
/// Name, image, price and stock are a snapshot of the product at the time the
/// line was written; they are not kept in sync with the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product: ProductId,
    pub name: String,
    pub image: String,
    pub price: Money,
    pub qty: i32,
    pub stock: i32,
}

impl CartItem {
    /// Build a line from authoritative catalog data.
    #[must_use]
    pub fn from_product(product: &Product, qty: i32) -> Self {
        Self {
            product: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
            qty,
            stock: product.stock,
        }
    }
}

/// A cart line as sent by the storefront when it saves the whole cart.
///
/// The storefront sometimes sends a product object itself as a line, in which
/// case the product ID arrives as `_id` instead of `product`.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemInput {
    #[serde(default)]
    pub product: Option<ProductId>,
    #[serde(default, rename = "_id")]
    pub id: Option<ProductId>,
    pub name: String,
    pub image: String,
    pub price: Money,
    pub qty: i32,
    pub stock: i32,
}

impl CartItemInput {
    /// Convert into a stored line.
    ///
    /// # Errors
    ///
    /// Returns a message if the line has no product ID or a non-positive quantity.
    pub fn into_item(self) -> Result<CartItem, String> {
        let product = self
            .product
            .or(self.id)
            .ok_or_else(|| format!("Cart item '{}' has no product", self.name))?;
        if self.qty < 1 {
            return Err(format!("Invalid quantity for {}", self.name));
        }

        Ok(CartItem {
            product,
            name: self.name,
            image: self.image,
            price: self.price,
            qty: self.qty,
            stock: self.stock,
        })
    }
}

/// A line from a guest's browser cart. Only the product and quantity are
/// trusted; everything else is re-read from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestCartItem {
    #[serde(default)]
    pub product: Option<ProductId>,
    #[serde(default, rename = "_id")]
    pub id: Option<ProductId>,
    pub qty: i32,
}

impl GuestCartItem {
    /// The referenced product, whichever key it arrived under.
    #[must_use]
    pub const fn product_id(&self) -> Option<ProductId> {
        match self.product {
            Some(id) => Some(id),
            None => self.id,
        }
    }
}

/// Fold a guest cart into the account's stored cart.
///
/// - Lines whose product is not in `catalog` are dropped.
/// - A product already in the stored cart has its quantity increased.
/// - Otherwise a new line is appended, built from catalog data.
///
/// Existing lines keep their order; new lines follow in guest order.
#[must_use]
pub fn merge_guest_cart(
    stored: Vec<CartItem>,
    guest: &[GuestCartItem],
    catalog: &HashMap<ProductId, Product>,
) -> Vec<CartItem> {
    let mut merged = stored;

    for guest_item in guest {
        if guest_item.qty < 1 {
            continue;
        }
        let Some(product) = guest_item.product_id().and_then(|id| catalog.get(&id)) else {
            continue;
        };

        if let Some(existing) = merged.iter_mut().find(|line| line.product == product.id) {
            existing.qty = existing.qty.saturating_add(guest_item.qty);
        } else {
            merged.push(CartItem::from_product(product, guest_item.qty));
        }
    }

    merged
}
