//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use eshop_core::{Email, UserId};

/// A shop account (customer or CRM admin).
///
/// Carries secrets (password hash, pending tokens), so it is deliberately not
/// `Serialize`. Use [`PublicUser`] for responses.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub is_admin: bool,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    /// SHA-256 hex of the token that was emailed.
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    /// Argon2id hash of the pending admin login code.
    pub two_factor_code: Option<String>,
    pub two_factor_expires: Option<DateTime<Utc>>,
    pub shipping_address: Option<UserAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Saved shipping address on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAddress {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Account data safe to return to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub is_admin: bool,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<UserAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            is_verified: user.is_verified,
            shipping_address: user.shipping_address.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}
