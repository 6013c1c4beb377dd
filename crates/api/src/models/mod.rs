//! Domain models for the API.
//!
//! These types are validated domain objects, separate from the database row
//! types in [`crate::db`]. Their `Serialize` impls define the JSON contract
//! with the storefront and CRM frontends (camelCase fields, `_id` keys).

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{CartItem, CartItemInput, GuestCartItem};
pub use order::{NewOrder, Order, OrderCustomer, OrderItem, PaymentResult, ShippingAddress};
pub use product::{Product, ProductInput};
pub use user::{PublicUser, User, UserAddress};
