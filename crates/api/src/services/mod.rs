//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Passwords, bearer tokens, admin two-factor login, password reset
//! - `email` - Transactional email (SMTP or log-only)
//! - `orders` - Order placement with stock checks
//! - `uploads` - Product image storage

pub mod auth;
pub mod email;
pub mod orders;
pub mod uploads;

pub use auth::{AuthError, AuthService, TokenSigner};
pub use email::{EmailError, EmailService};
pub use orders::{OrderError, OrderService, PlaceOrder};
pub use uploads::{UploadError, UploadStore};
