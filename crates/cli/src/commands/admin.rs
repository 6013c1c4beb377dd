//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Grant admin rights to a registered account
//! eshop-cli admin promote -e admin@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use thiserror::Error;

use eshop_api::db::{RepositoryError, UserRepository};
use eshop_core::Email;

use super::ConnectError;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user registered with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Mark an existing account as a verified admin.
///
/// The account must already exist; register through the storefront first.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account uses `email`.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = super::connect().await?;

    tracing::info!("Promoting user: {}", email);

    let user = UserRepository::new(&pool)
        .promote_to_admin(&email)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "User promoted successfully! ID: {}, Username: {}, Email: {}",
        user.id,
        user.username,
        user.email
    );
    tracing::info!("Sign in to the CRM through the two-step admin login.");

    Ok(())
}
