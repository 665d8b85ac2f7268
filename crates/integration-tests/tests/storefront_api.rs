//! End-to-end tests against a running storefront.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`agape migrate`)
//! - The seed catalog loaded (`agape seed --skip-existing`)
//! - The storefront running (`cargo run -p agape-storefront`)
//! - For admin tests, an admin account (`agape admin create`) whose
//!   credentials are in `STOREFRONT_ADMIN_EMAIL` / `STOREFRONT_ADMIN_PASSWORD`
//! - For webhook tests, the server's `PAYSTACK_SECRET_KEY`
//!
//! Run with: `cargo test -p agape-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use agape_integration_tests::{api_url, charge_success, client, storefront_base_url, unique_email};
use agape_storefront::services::paystack::sign_webhook;

/// Register a fresh customer and return their access token.
async fn register(client: &Client) -> String {
    let resp = client
        .post(api_url("/auth/register"))
        .json(&json!({
            "email": unique_email(),
            "password": "kente-and-lace-2026",
            "name": "Ama Mensah",
            "phone": "+233201234567",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Failed to parse register response");
    assert_eq!(body["status"], "success");
    body["data"]["accessToken"]
        .as_str()
        .expect("accessToken in register response")
        .to_string()
}

/// Log in as the admin named by `STOREFRONT_ADMIN_EMAIL` and return a token.
async fn admin_token(client: &Client) -> String {
    let email = std::env::var("STOREFRONT_ADMIN_EMAIL").expect("STOREFRONT_ADMIN_EMAIL");
    let password = std::env::var("STOREFRONT_ADMIN_PASSWORD").expect("STOREFRONT_ADMIN_PASSWORD");
    let resp = client
        .post(api_url("/auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to log in");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse login response");
    body["data"]["accessToken"]
        .as_str()
        .expect("accessToken in login response")
        .to_string()
}

// ============================================================================
// Health & Routing
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_and_readiness() {
    let client = client();
    let base_url = storefront_base_url();

    let resp = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_route_uses_error_envelope() {
    let resp = client().get(api_url("/nope")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Route /api/v1/nope not found");
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_seeded_product_by_slug() {
    let resp = client()
        .get(api_url("/products/royal-asante-kente"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["sku"], "KNT-001");
    assert_eq!(body["data"]["price"], "450.00");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_product_listing_is_paginated() {
    let resp = client()
        .get(api_url("/products?limit=2&page=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let items = body["data"]["items"].as_array().expect("items array");
    assert!(items.len() <= 2);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_huge_page_number_returns_empty_page() {
    let resp = client()
        .get(api_url("/products?page=9223372036854775807"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_deleted_product_leaves_listings() {
    let client = client();
    let token = admin_token(&client).await;
    let marker = uuid::Uuid::new_v4().simple().to_string();
    let title = format!("Adinkra Stole {marker}");

    let resp = client
        .post(api_url("/products"))
        .bearer_auth(&token)
        .json(&json!({"sku": format!("IT-{marker}"), "title": title, "price": "120.00", "inventory": 4}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_i64().expect("product id");
    let slug = body["data"]["slug"].as_str().expect("product slug").to_string();

    let listed = |body: &Value| {
        body["data"]["items"]
            .as_array()
            .is_some_and(|items| items.iter().any(|p| p["id"].as_i64() == Some(id)))
    };
    let search = api_url(&format!("/products?search={marker}"));

    let body: Value = client.get(&search).send().await.unwrap().json().await.unwrap();
    assert!(listed(&body));

    let resp = client
        .delete(api_url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = client.get(&search).send().await.unwrap().json().await.unwrap();
    assert!(!listed(&body));

    let resp = client
        .get(api_url(&format!("/products/{slug}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_blank_search_is_rejected() {
    let resp = client()
        .get(api_url("/products/search?q=%20"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_creating_products_requires_admin() {
    let client = client();
    let resp = client
        .post(api_url("/products"))
        .json(&json!({"sku": "KNT-999", "title": "Test", "price": "10.00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = register(&client).await;
    let resp = client
        .post(api_url("/products"))
        .bearer_auth(token)
        .json(&json!({"sku": "KNT-999", "title": "Test", "price": "10.00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_me_and_refresh_cookie() {
    let client = client();
    let token = register(&client).await;

    let resp = client
        .get(api_url("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Ama Mensah");
    assert_eq!(body["data"]["role"], "customer");

    // The refresh cookie from registration is enough to mint a new token
    let resp = client.post(api_url("/auth/refresh")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["accessToken"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_wrong_password_is_401() {
    let resp = client()
        .post(api_url("/auth/login"))
        .json(&json!({"email": "nobody@example.com", "password": "wrong-password-123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_coupon_is_404() {
    let resp = client()
        .post(api_url("/coupons/apply"))
        .json(&json!({"code": "NOPE-NOT-REAL", "cartSubtotal": "100.00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_order_is_rejected() {
    let client = client();
    let token = register(&client).await;

    let resp = client
        .post(api_url("/orders"))
        .bearer_auth(token)
        .json(&json!({
            "items": [],
            "shippingAddress": {
                "fullName": "Ama Mensah",
                "phone": "+233201234567",
                "address": "12 Oxford Street",
                "city": "Accra",
                "state": "Greater Accra"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Order must contain at least one item");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_orders_require_authentication() {
    let resp = client().get(api_url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unsigned_webhook_is_rejected() {
    let resp = client()
        .post(api_url("/payments/webhook"))
        .json(&json!({"event": "charge.success", "data": {"reference": "AGP-PAY-X"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server and PAYSTACK_SECRET_KEY"]
async fn test_repeated_webhook_delivery_is_acknowledged() {
    let secret = std::env::var("PAYSTACK_SECRET_KEY").expect("PAYSTACK_SECRET_KEY");
    let reference = format!("AGP-PAY-{}", uuid::Uuid::new_v4());
    let body = serde_json::to_vec(&charge_success(&reference, 50_000, chrono::Utc::now())).unwrap();
    let signature = sign_webhook(secret.as_bytes(), &body);

    let client = client();
    for _ in 0..2 {
        let resp = client
            .post(api_url("/payments/webhook"))
            .header("content-type", "application/json")
            .header("x-paystack-signature", &signature)
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ack: Value = resp.json().await.unwrap();
        assert_eq!(ack["status"], "success");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_callback_redirects_to_frontend() {
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(api_url("/payments/callback?reference=AGP-PAY-abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.ends_with("/checkout/success?reference=AGP-PAY-abc"));
}
