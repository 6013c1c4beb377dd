//! Product domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eshop_core::{Money, ProductId, UserId};

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Admin who created the product; `None` once that account is deleted.
    pub user: Option<UserId>,
    pub name: String,
    pub image: String,
    pub description: String,
    pub price: Money,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Prefix of image paths that point at files this API stored.
    pub const UPLOADS_PREFIX: &'static str = "/uploads";

    /// Whether the image was uploaded through this API (as opposed to a bundled
    /// frontend asset like `/images/sample.jpg`).
    #[must_use]
    pub fn has_uploaded_image(&self) -> bool {
        self.image.starts_with(Self::UPLOADS_PREFIX)
    }
}

/// Editable product fields, as sent by the CRM.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub price: Money,
    pub description: String,
    pub image: String,
    pub stock: i32,
}

impl ProductInput {
    /// The placeholder product the CRM creates before the admin edits it.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            name: "Sample name".to_string(),
            price: Money::ZERO,
            description: "Sample description".to_string(),
            image: "/images/sample.jpg".to_string(),
            stock: 0,
        }
    }

    /// Reject values the catalog cannot represent.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        if self.price.is_negative() {
            return Err("Price cannot be negative".to_string());
        }
        if self.stock < 0 {
            return Err("Stock cannot be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with_image(image: &str) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            user: None,
            name: "Keychron K2".to_string(),
            image: image.to_string(),
            description: String::new(),
            price: Money::from_minor(45_000),
            stock: 15,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_has_uploaded_image() {
        assert!(product_with_image("/uploads/product-image-1.png").has_uploaded_image());
        assert!(!product_with_image("/images/sample.jpg").has_uploaded_image());
        assert!(!product_with_image("https://cdn.example.com/a.png").has_uploaded_image());
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(ProductInput::sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let mut input = ProductInput::sample();
        input.stock = -1;
        assert!(input.validate().is_err());

        let mut input = ProductInput::sample();
        input.price = Money::from_minor(-100);
        assert!(input.validate().is_err());

        let mut input = ProductInput::sample();
        input.name = "  ".to_string();
        assert!(input.validate().is_err());
    }
}
