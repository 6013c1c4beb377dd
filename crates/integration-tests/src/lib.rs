//! Integration tests for the E-Shop API.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare the database and start the server
//! cargo run -p eshop-cli -- migrate
//! cargo run -p eshop-api
//!
//! # Run the ignored tests against it
//! cargo test -p eshop-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `API_BASE_URL` - Server under test (default: `http://127.0.0.1:5001`)
//! - `DATABASE_URL` - Same database the server uses; tests read emailed
//!   tokens straight from it instead of from a mailbox
//!
//! Run the server on the same host with SMTP unset. Emails are then only
//! logged, and the tests plant known reset tokens and admin codes in the
//! database in place of the mailed ones.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "integration-pass-123";

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5001".to_string())
}

/// Build an `/api/...` URL.
#[must_use]
pub fn api_url(path: &str) -> String {
    format!("{}/api{path}", api_base_url())
}

/// Plain HTTP client that does not follow redirects, so verification
/// redirects can be asserted.
///
/// Each client announces its own `X-Forwarded-For` address. A server on the
/// same host trusts that header from its loopback peer, so every client gets
/// a separate rate-limit bucket instead of the whole suite sharing one.
#[must_use]
pub fn client() -> Client {
    let [a, b, c, ..] = *Uuid::new_v4().as_bytes();
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&format!("10.{a}.{b}.{c}")).expect("valid header value"),
    );

    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the database the server under test uses.
pub async fn db() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database")
}

/// A unique throwaway email address.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// A registered, verified and logged-in customer.
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub token: String,
}

/// Register a fresh account and follow its verification link. Returns the
/// account's email.
///
/// Needs SMTP disabled or pointed at a sink: registration fails when the
/// verification email cannot be sent.
pub async fn register_and_verify(client: &Client, pool: &PgPool) -> String {
    let email = unique_email();

    let resp = client
        .post(api_url("/users/register"))
        .json(&json!({ "username": "Integration", "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), 201, "registration failed");

    let token: String =
        sqlx::query_scalar("SELECT verification_token FROM users WHERE email = $1")
            .bind(&email)
            .fetch_one(pool)
            .await
            .expect("Registered user has no verification token");

    let resp = client
        .get(api_url(&format!("/users/verify/{token}")))
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), 302, "verification did not redirect");

    email
}

/// Log in with [`TEST_PASSWORD`], sending `guest_cart` along. Returns the
/// login response body.
pub async fn login(client: &Client, email: &str, guest_cart: Value) -> Value {
    let resp = client
        .post(api_url("/users/login"))
        .json(&json!({ "email": email, "password": TEST_PASSWORD, "guestCart": guest_cart }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), 200, "login failed");
    resp.json().await.expect("Login response is not JSON")
}

fn test_user(email: String, body: &Value) -> TestUser {
    TestUser {
        id: body["_id"].as_i64().expect("auth response has _id"),
        email,
        token: body["token"]
            .as_str()
            .expect("auth response has token")
            .to_string(),
    }
}

/// Register a fresh account, follow its verification link and log in.
pub async fn verified_user(client: &Client, pool: &PgPool) -> TestUser {
    let email = register_and_verify(client, pool).await;
    let body = login(client, &email, json!([])).await;
    test_user(email, &body)
}

/// Second factor the tests plant for admin logins.
pub const TEST_TWO_FACTOR_CODE: &str = "246810";

/// A verified account promoted to admin and logged in through both admin
/// steps.
///
/// The emailed code is never seen, so once step one has stored one the test
/// replaces its hash with that of [`TEST_TWO_FACTOR_CODE`].
pub async fn admin_user(client: &Client, pool: &PgPool) -> TestUser {
    let email = register_and_verify(client, pool).await;
    sqlx::query("UPDATE users SET is_admin = TRUE WHERE email = $1")
        .bind(&email)
        .execute(pool)
        .await
        .expect("Failed to promote test admin");

    let resp = client
        .post(api_url("/users/admin/login"))
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to start admin login");
    assert_eq!(resp.status(), 200, "admin login step one failed");

    let code_hash = eshop_api::services::auth::hash_password(TEST_TWO_FACTOR_CODE)
        .expect("Failed to hash test code");
    sqlx::query(
        "UPDATE users SET two_factor_code = $2, two_factor_expires = NOW() + INTERVAL '10 minutes' \
         WHERE email = $1 AND two_factor_code IS NOT NULL",
    )
    .bind(&email)
    .bind(code_hash)
    .execute(pool)
    .await
    .expect("Failed to plant test code");

    let resp = client
        .post(api_url("/users/admin/verify"))
        .json(&json!({ "email": email, "twoFactorCode": TEST_TWO_FACTOR_CODE }))
        .send()
        .await
        .expect("Failed to finish admin login");
    assert_eq!(resp.status(), 200, "admin login step two failed");
    let body: Value = resp.json().await.expect("Admin verify response is not JSON");

    test_user(email, &body)
}

/// Insert a product directly and return its ID.
pub async fn insert_product(pool: &PgPool, price: &str, stock: i32) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO products (name, image, description, price, stock) \
         VALUES ($1, '/images/integration.jpg', 'Integration product', $2::numeric, $3) \
         RETURNING id",
    )
    .bind(format!("Integration {}", Uuid::new_v4().simple()))
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("Failed to insert test product")
}

/// Current stock of a product.
pub async fn product_stock(pool: &PgPool, id: i32) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Test product is missing")
}

/// Remove a product created by a test.
pub async fn delete_product(pool: &PgPool, id: i32) {
    let _ = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await;
}

/// Remove an account created by a test.
pub async fn delete_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}
