//! Server-level endpoints.

use eshop_integration_tests::{api_base_url, api_url, client};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_root_and_health() {
    let client = client();

    let resp = client
        .get(api_base_url())
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "API is running");

    let resp = client
        .get(format!("{}/health/ready", api_base_url()))
        .send()
        .await
        .expect("Failed to reach readiness endpoint");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_api_banner_is_html() {
    let resp = client()
        .get(api_url("/test"))
        .send()
        .await
        .expect("Failed to reach /api/test");

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().expect("header");
    assert!(content_type.starts_with("text/html"));
}
