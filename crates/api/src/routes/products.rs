//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use eshop_core::ProductId;

use super::{MessageResponse, parse_id};
use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductInput};
use crate::state::AppState;

/// Products per catalog page.
pub const PAGE_SIZE: i64 = 4;

/// Products returned by the "top" carousel.
const TOP_PRODUCTS: i64 = 3;

const NOT_FOUND: &str = "Product not found";

/// Pagination query parameters. Kept as a string so junk falls back to page 1.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "pageNumber")]
    pub page_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: i64,
    pub pages: i64,
}

/// The requested page, or 1 when missing, unparseable or not positive.
fn requested_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

/// Number of pages needed for `count` products.
const fn page_count(count: i64) -> i64 {
    (count + PAGE_SIZE - 1) / PAGE_SIZE
}

/// `GET /api/products?pageNumber=n`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProductPage>> {
    let page = requested_page(query.page_number.as_deref());
    let repo = ProductRepository::new(state.pool());

    let count = repo.count().await?;
    let products = repo
        .list_page(PAGE_SIZE, (page - 1).saturating_mul(PAGE_SIZE))
        .await?;

    Ok(Json(ProductPage {
        products,
        page,
        pages: page_count(count),
    }))
}

/// `GET /api/products/admin`
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(ProductRepository::new(state.pool()).list_all().await?))
}

/// `GET /api/products/top`
pub async fn top(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .random(TOP_PRODUCTS)
            .await?,
    ))
}

/// `GET /api/products/{id}`
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    let id: ProductId = parse_id(&id, NOT_FOUND)?;
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
}

/// `POST /api/products`: create a placeholder for the admin to edit.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<(StatusCode, Json<Product>)> {
    let product = ProductRepository::new(state.pool())
        .create(Some(admin.id), &ProductInput::sample())
        .await?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Sample product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/products/{id}`
///
/// When the image changes, the old file is deleted if this API stored it.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let id: ProductId = parse_id(&id, NOT_FOUND)?;
    input.validate().map_err(AppError::BadRequest)?;

    let repo = ProductRepository::new(state.pool());
    let existing = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    let updated = repo.update(id, &input).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound(NOT_FOUND.to_string()),
        other => other.into(),
    })?;

    if existing.image != updated.image && existing.has_uploaded_image() {
        state.uploads().remove(&existing.image).await;
    }

    Ok(Json(updated))
}

/// `DELETE /api/products/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id: ProductId = parse_id(&id, NOT_FOUND)?;

    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound(NOT_FOUND.to_string()));
    }

    tracing::info!(product_id = %id, admin_id = %admin.id, "Product removed");
    Ok(Json(MessageResponse::new("Product removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_page_defaults_to_one() {
        assert_eq!(requested_page(None), 1);
        assert_eq!(requested_page(Some("")), 1);
        assert_eq!(requested_page(Some("abc")), 1);
        assert_eq!(requested_page(Some("0")), 1);
        assert_eq!(requested_page(Some("-3")), 1);
        assert_eq!(requested_page(Some("2")), 2);
    }

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(4), 1);
        assert_eq!(page_count(5), 2);
        assert_eq!(page_count(9), 3);
    }
}
