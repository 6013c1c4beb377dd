//! Sample catalog data.
//!
//! # Usage
//!
//! ```bash
//! # Replace the catalog with the sample products
//! eshop-cli seed import
//!
//! # Delete every product
//! eshop-cli seed destroy
//! ```
//!
//! Importing assigns the products to the oldest admin account, so promote one
//! first with `eshop-cli admin promote`.

use thiserror::Error;

use eshop_api::db::{ProductRepository, RepositoryError, UserRepository};
use eshop_api::models::ProductInput;
use eshop_core::Money;

use super::ConnectError;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("No admin user found. Please create an admin user first.")]
    NoAdmin,
}

/// The sample catalog.
fn sample_products() -> Vec<ProductInput> {
    vec![
        ProductInput {
            name: "Sony WH-1000XM5 Wireless Headphones".to_string(),
            image: "/images/sony-headphones.jpg".to_string(),
            description: "The new generation of noise cancelling headphones with \
                          breathtaking sound and an especially comfortable design."
                .to_string(),
            price: Money::from_minor(149_990),
            stock: 10,
        },
        ProductInput {
            name: "Keychron K2 Mechanical Keyboard".to_string(),
            image: "/images/keychron-k2.jpg".to_string(),
            description: "Compact 75% mechanical keyboard with RGB backlight, \
                          wireless and wired, for Mac and Windows."
                .to_string(),
            price: Money::from_minor(45_000),
            stock: 15,
        },
        ProductInput {
            name: "Google Pixel 8 Pro Smartphone".to_string(),
            image: "/images/pixel-8-pro.jpg".to_string(),
            description: "Google's flagship with an AI-powered camera system and \
                          the Super Actua Display."
                .to_string(),
            price: Money::from_minor(380_000),
            stock: 5,
        },
    ]
}

/// Replace the whole catalog with the sample products.
///
/// # Errors
///
/// Returns `SeedError::NoAdmin` if no admin account exists yet.
pub async fn import() -> Result<(), SeedError> {
    let pool = super::connect().await?;

    let admin = UserRepository::new(&pool)
        .first_admin()
        .await?
        .ok_or(SeedError::NoAdmin)?;

    let products = ProductRepository::new(&pool)
        .replace_all(admin.id, &sample_products())
        .await?;

    tracing::info!(
        count = products.len(),
        owner = %admin.email,
        "Data imported!"
    );
    Ok(())
}

/// Delete every product.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn destroy() -> Result<(), SeedError> {
    let pool = super::connect().await?;

    let removed = ProductRepository::new(&pool).delete_all().await?;

    tracing::info!(removed, "Data destroyed!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_products_are_valid() {
        let products = sample_products();
        assert_eq!(products.len(), 3);
        for product in &products {
            assert!(product.validate().is_ok(), "{} is invalid", product.name);
        }
        assert_eq!(products[0].price, Money::from_minor(149_990));
    }
}
