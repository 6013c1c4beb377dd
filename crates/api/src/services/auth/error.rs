//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown email.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Admin login with a wrong password or by a non-admin account.
    #[error("Invalid email or password, or not an admin")]
    InvalidAdminCredentials,

    /// Login attempted before the email link was followed.
    #[error("Please verify your email before logging in")]
    NotVerified,

    /// Admin second factor missing, wrong or expired.
    #[error("Invalid or expired verification code")]
    InvalidTwoFactorCode,

    /// Password reset token unknown or expired.
    #[error("Invalid or expired token")]
    InvalidResetToken,

    /// Email verification token unknown.
    #[error("Invalid verification token")]
    InvalidVerificationToken,

    /// Registration with an email that already has an account.
    #[error("User already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Bearer token malformed, tampered with or expired.
    #[error("invalid token")]
    InvalidToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
