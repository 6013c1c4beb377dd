//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{AuthError, EmailError, EmailService, TokenSigner, UploadStore};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid token secret: {0}")]
    TokenSecret(#[from] AuthError),
    #[error("email setup failed: {0}")]
    Email(#[from] EmailError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenSigner,
    email: EmailService,
    uploads: UploadStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the token secret is unusable or the SMTP relay
    /// cannot be configured.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let tokens = TokenSigner::new(&config.token_secret)?;
        let email = EmailService::new(config.email.as_ref())?;
        let uploads = UploadStore::new(config.upload_dir.clone());

        if !email.is_enabled() {
            tracing::warn!("SMTP not configured, emails will only be logged");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                email,
                uploads,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Bearer token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// Transactional email.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Uploaded image storage.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }
}
