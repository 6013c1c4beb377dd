//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use eshop_core::{Money, OrderId, UserId};

use super::parse_id;
use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::order::OrderItemInput;
use crate::models::{Order, PaymentResult, ShippingAddress, User};
use crate::services::{OrderService, PlaceOrder};
use crate::state::AppState;

const NOT_FOUND: &str = "Order not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItemInput>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub total_price: Money,
}

fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND.to_string())
}

fn map_missing(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => not_found(),
        other => other.into(),
    }
}

/// Load an order the caller may see: their own, or any order for admins.
/// Anything else looks like a missing order.
async fn visible_order(state: &AppState, user: &User, raw_id: &str) -> Result<Order> {
    let id: OrderId = parse_id(raw_id, NOT_FOUND)?;
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(not_found)?;

    if order.is_owned_by(user.id) || user.is_admin {
        Ok(order)
    } else {
        Err(not_found())
    }
}

/// `POST /api/orders`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.pool())
        .place(
            user.id,
            PlaceOrder {
                items: req.order_items,
                shipping_address: req.shipping_address,
                payment_method: req.payment_method,
                total_price: req.total_price,
            },
        )
        .await?;

    let link = format!(
        "{}/order/{}",
        state.config().frontend.store_url.trim_end_matches('/'),
        order.id
    );
    if let Err(e) = state
        .email()
        .send_order_confirmation(&user.email, &user.username, &order, &link)
        .await
    {
        tracing::warn!(order_id = %order.id, error = %e, "Order confirmation email failed");
    }

    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders/myorders`
pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_for_user(user.id)
            .await?,
    ))
}

/// `GET /api/orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(visible_order(&state, &user, &id).await?))
}

/// `PUT /api/orders/{id}/pay`
///
/// The receipt goes to the customer who placed the order, which is not
/// necessarily the caller when an admin records the payment.
pub async fn pay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(result): Json<PaymentResult>,
) -> Result<Json<Order>> {
    let order = visible_order(&state, &user, &id).await?;

    let paid = OrderRepository::new(state.pool())
        .mark_paid(order.id, &result)
        .await
        .map_err(map_missing)?;

    tracing::info!(order_id = %paid.id, total = %paid.total_price, "Order paid");

    if let Some(customer) = &paid.user
        && let Err(e) = state
            .email()
            .send_payment_receipt(&customer.email, &customer.username, &paid)
            .await
    {
        tracing::warn!(order_id = %paid.id, error = %e, "Payment receipt email failed");
    }

    Ok(Json(paid))
}

/// `PUT /api/orders/{id}/receive`: the customer confirms delivery.
pub async fn receive(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, NOT_FOUND)?;
    let repo = OrderRepository::new(state.pool());
    let order = repo.get_by_id(id).await?.ok_or_else(not_found)?;

    if !order.is_owned_by(user.id) {
        return Err(AppError::Unauthorized(
            "Not authorized to update this order".to_string(),
        ));
    }

    Ok(Json(repo.mark_delivered(id).await.map_err(map_missing)?))
}

/// `GET /api/orders`
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderRepository::new(state.pool()).list_all().await?))
}

/// `GET /api/orders/user/{userId}`
pub async fn list_for_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Order>>> {
    let user_id: UserId = parse_id(&user_id, "User not found")?;
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_for_user(user_id)
            .await?,
    ))
}

/// `PUT /api/orders/{id}/deliver`
pub async fn deliver(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, NOT_FOUND)?;
    let order = OrderRepository::new(state.pool())
        .mark_delivered(id)
        .await
        .map_err(map_missing)?;

    tracing::info!(order_id = %order.id, admin_id = %admin.id, "Order marked delivered");
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use eshop_core::ProductId;

    use super::*;

    #[test]
    fn test_create_order_request_shape() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "orderItems": [
                { "product": 1, "name": "Sony WH-1000XM5", "qty": 1, "image": "/images/sony-headphones.jpg", "price": 1499.9 },
                { "_id": 2, "name": "Keychron K2", "qty": 2, "image": "/images/keychron-k2.jpg", "price": 450 }
            ],
            "shippingAddress": { "address": "1 Herzl St", "city": "Haifa", "postalCode": "3100001" },
            "paymentMethod": "PayPal",
            "totalPrice": 2399.9
        }))
        .unwrap();

        assert_eq!(req.order_items.len(), 2);
        assert_eq!(req.order_items[1].product_id(), Some(ProductId::new(2)));
        assert_eq!(req.shipping_address.postal_code, "3100001");
        assert_eq!(req.shipping_address.country, None);
        assert_eq!(req.payment_method, "PayPal");
        assert_eq!(req.total_price, Money::from_minor(239_990));
    }

    #[test]
    fn test_empty_create_order_request_deserializes() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(req.order_items.is_empty());
    }

    #[test]
    fn test_map_missing() {
        assert!(matches!(
            map_missing(RepositoryError::NotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            map_missing(RepositoryError::Conflict("x".to_string())),
            AppError::Database(_)
        ));
    }
}
