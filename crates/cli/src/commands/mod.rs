//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Read `DATABASE_URL` (from the environment or `.env`).
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").ok().map(SecretString::from)
}

/// Connect to the shop database.
async fn connect() -> Result<PgPool, ConnectError> {
    let url = database_url().ok_or(ConnectError::MissingEnvVar("DATABASE_URL"))?;
    tracing::info!("Connecting to database...");
    Ok(eshop_api::db::create_pool(&url).await?)
}

/// Errors reaching the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
