//! Checkout, payment, delivery and the sales dashboard.

use eshop_integration_tests::{
    TestUser, admin_user, api_url, client, db, delete_product, delete_user, insert_product,
    product_stock, verified_user,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;

/// Place an order for `qty` units of `product` at 19.90 each.
async fn place_order(
    client: &Client,
    user: &TestUser,
    product: i32,
    qty: i64,
) -> reqwest::Response {
    #[allow(clippy::cast_precision_loss)]
    let total = 19.9 * qty as f64;
    client
        .post(api_url("/orders"))
        .bearer_auth(&user.token)
        .json(&json!({
            "orderItems": [{
                "product": product,
                "name": "Integration product",
                "qty": qty,
                "image": "/images/integration.jpg",
                "price": 19.9,
            }],
            "shippingAddress": { "address": "1 Main St", "city": "Haifa", "postalCode": "3100001" },
            "paymentMethod": "PayPal",
            "totalPrice": total,
        }))
        .send()
        .await
        .expect("Failed to post order")
}

async fn placed_order_id(client: &Client, user: &TestUser, product: i32, qty: i64) -> i64 {
    let resp = place_order(client, user, product, qty).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("JSON body");
    order["_id"].as_i64().expect("order _id")
}

fn payment() -> Value {
    json!({ "id": "PAY-1", "status": "COMPLETED", "update_time": "2025-01-01T00:00:00Z" })
}

async fn delete_order(pool: &PgPool, id: i64) {
    let _ = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await;
}

async fn total_sales(client: &Client, admin: &TestUser) -> f64 {
    let stats: Value = client
        .get(api_url("/dashboard/stats"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to get stats")
        .json()
        .await
        .expect("JSON body");
    stats["totalSales"].as_f64().expect("totalSales")
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_order_decrements_stock_and_clears_cart() {
    let client = client();
    let pool = db().await;
    let product = insert_product(&pool, "19.90", 5).await;
    let user = verified_user(&client, &pool).await;

    let resp = client
        .post(api_url("/users/cart"))
        .bearer_auth(&user.token)
        .json(&json!({ "cartItems": [{
            "product": product,
            "name": "Integration product",
            "image": "/images/integration.jpg",
            "price": 19.9,
            "qty": 2,
            "stock": 5,
        }] }))
        .send()
        .await
        .expect("Failed to save cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = place_order(&client, &user, product, 2).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("JSON body");
    assert_eq!(order["isPaid"], false);
    assert_eq!(order["isDelivered"], false);
    assert_eq!(order["orderItems"][0]["product"], product);
    assert_eq!(order["orderItems"][0]["qty"], 2);
    let order_id = order["_id"].as_i64().expect("order _id");

    assert_eq!(product_stock(&pool, product).await, 3);

    let cart: Value = client
        .get(api_url("/users/cart"))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("JSON body");
    assert_eq!(cart, json!([]));

    // More than what is left is refused and leaves stock alone
    let resp = place_order(&client, &user, product, 4).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(product_stock(&pool, product).await, 3);

    let mine: Value = client
        .get(api_url("/orders/myorders"))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("JSON body");
    assert_eq!(mine.as_array().expect("orders").len(), 1);
    assert_eq!(mine[0]["_id"], order_id);

    delete_order(&pool, order_id).await;
    delete_user(&pool, &user.email).await;
    delete_product(&pool, product).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_other_customers_cannot_pay_or_receive() {
    let client = client();
    let pool = db().await;
    let product = insert_product(&pool, "19.90", 5).await;
    let owner = verified_user(&client, &pool).await;
    let stranger = verified_user(&client, &pool).await;
    let order_id = placed_order_id(&client, &owner, product, 1).await;

    let resp = client
        .get(api_url(&format!("/orders/{order_id}")))
        .bearer_auth(&stranger.token)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .put(api_url(&format!("/orders/{order_id}/pay")))
        .bearer_auth(&stranger.token)
        .json(&payment())
        .send()
        .await
        .expect("Failed to pay");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(body["message"], "Order not found");

    let resp = client
        .put(api_url(&format!("/orders/{order_id}/receive")))
        .bearer_auth(&stranger.token)
        .send()
        .await
        .expect("Failed to receive");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(body["message"], "Not authorized to update this order");

    let paid: bool = sqlx::query_scalar("SELECT is_paid FROM orders WHERE id = $1")
        .bind(i32::try_from(order_id).expect("order id fits i32"))
        .fetch_one(&pool)
        .await
        .expect("Order is missing");
    assert!(!paid);

    delete_order(&pool, order_id).await;
    delete_user(&pool, &owner.email).await;
    delete_user(&pool, &stranger.email).await;
    delete_product(&pool, product).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_account_with_open_order_cannot_be_deleted() {
    let client = client();
    let pool = db().await;
    let product = insert_product(&pool, "19.90", 5).await;
    let user = verified_user(&client, &pool).await;
    let order_id = placed_order_id(&client, &user, product, 1).await;

    let resp = client
        .delete(api_url("/users/profile"))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to delete profile");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .put(api_url(&format!("/orders/{order_id}/receive")))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to receive");
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.expect("JSON body");
    assert_eq!(order["isDelivered"], true);

    let resp = client
        .delete(api_url("/users/profile"))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to delete profile");
    assert_eq!(resp.status(), StatusCode::OK);

    delete_order(&pool, order_id).await;
    delete_product(&pool, product).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_dashboard_sales_count_paid_orders_only() {
    let client = client();
    let pool = db().await;
    let product = insert_product(&pool, "19.90", 5).await;
    let admin = admin_user(&client, &pool).await;
    let user = verified_user(&client, &pool).await;

    let before = total_sales(&client, &admin).await;
    let order_id = placed_order_id(&client, &user, product, 2).await;

    let unpaid = total_sales(&client, &admin).await;
    assert!((unpaid - before).abs() < 0.001, "unpaid order counted as a sale");

    let resp = client
        .put(api_url(&format!("/orders/{order_id}/pay")))
        .bearer_auth(&user.token)
        .json(&payment())
        .send()
        .await
        .expect("Failed to pay");
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.expect("JSON body");
    assert_eq!(order["isPaid"], true);
    assert_eq!(order["paymentResult"]["status"], "COMPLETED");

    let paid = total_sales(&client, &admin).await;
    assert!((paid - before - 39.8).abs() < 0.001, "paid order not counted once");

    delete_order(&pool, order_id).await;
    delete_user(&pool, &user.email).await;
    delete_user(&pool, &admin.email).await;
    delete_product(&pool, product).await;
}
