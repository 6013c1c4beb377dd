//! Product image uploads over multipart.

use eshop_integration_tests::{
    admin_user, api_base_url, api_url, client, db, delete_user, verified_user,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

fn image_form(field: &str, file_name: &str, mime: &str, bytes: &'static [u8]) -> Form {
    let part = Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("valid mime");
    Form::new().part(field.to_string(), part)
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_upload_stores_and_serves_image() {
    let client = client();
    let pool = db().await;
    let admin = admin_user(&client, &pool).await;

    let resp = client
        .post(api_url("/upload"))
        .bearer_auth(&admin.token)
        .multipart(image_form("image", "Shoe.PNG", "image/png", PNG_BYTES))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(body["message"], "Image uploaded successfully");

    let image = body["image"].as_str().expect("image path");
    assert!(image.starts_with("/uploads/product-image-"));
    assert!(image.ends_with(".png"));

    let served = client
        .get(format!("{}{image}", api_base_url()))
        .send()
        .await
        .expect("Failed to fetch uploaded image");
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(&served.bytes().await.expect("image bytes")[..], PNG_BYTES);

    delete_user(&pool, &admin.email).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_upload_rejects_bad_requests() {
    let client = client();
    let pool = db().await;
    let admin = admin_user(&client, &pool).await;
    let customer = verified_user(&client, &pool).await;

    let resp = client
        .post(api_url("/upload"))
        .bearer_auth(&admin.token)
        .multipart(image_form("image", "notes.txt", "text/plain", b"not an image"))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(body["message"], "Images only! Allowed types: jpeg, jpg, png");

    // A png name does not excuse a non-image content type
    let resp = client
        .post(api_url("/upload"))
        .bearer_auth(&admin.token)
        .multipart(image_form("image", "photo.png", "text/plain", PNG_BYTES))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(api_url("/upload"))
        .bearer_auth(&admin.token)
        .multipart(image_form("picture", "photo.png", "image/png", PNG_BYTES))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(body["message"], "Please upload a file");

    let resp = client
        .post(api_url("/upload"))
        .bearer_auth(&customer.token)
        .multipart(image_form("image", "photo.png", "image/png", PNG_BYTES))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    delete_user(&pool, &admin.email).await;
    delete_user(&pool, &customer.email).await;
}
