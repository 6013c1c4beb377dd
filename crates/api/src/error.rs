//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Client-facing bodies are JSON: `{"message": "..."}`, or
//! `{"errors": [{"field", "message"}]}` for input validation failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::order::StockError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::orders::OrderError;
use crate::services::uploads::UploadError;

/// Message sent in place of any server-side failure.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Sending mail failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Order placement failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Image upload failed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// One or more input fields are invalid.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated or not allowed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a [FieldError],
}

impl AppError {
    /// Whether this error is our fault rather than the client's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Email(_) | Self::Internal(_) => true,
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            Self::Order(err) => matches!(err, OrderError::Repository(_)),
            Self::Upload(err) => matches!(err, UploadError::Io(_)),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        if self.is_server_error() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidAdminCredentials
                | AuthError::NotVerified
                | AuthError::InvalidTwoFactorCode
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Order(OrderError::Stock(StockError::ProductNotFound { .. }))
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn client_message(&self) -> String {
        if self.is_server_error() {
            return INTERNAL_MESSAGE.to_string();
        }
        match self {
            Self::Auth(AuthError::InvalidToken) => "Not authorized, token failed".to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Order(OrderError::Stock(err)) => err.to_string(),
            Self::Upload(err) => err.to_string(),
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => {
                "Too many requests from this IP, please try again after 15 minutes".to_string()
            }
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        if let Self::Validation(errors) = &self {
            return (status, Json(ValidationBody { errors })).into_response();
        }

        // Don't expose internal error details to clients
        let message = self.client_message();
        (status, Json(MessageBody { message: &message })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
