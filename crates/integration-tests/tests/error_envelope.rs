//! Every error family maps to the right status and the `{status, message}`
//! envelope, without leaking internal details.

#![allow(clippy::unwrap_used)]

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use agape_integration_tests::dec;
use agape_storefront::db::RepositoryError;
use agape_storefront::error::AppError;
use agape_storefront::services::{
    AuthError, CatalogError, CheckoutError, CouponError, PaymentError, PaystackError,
};

async fn render(err: impl Into<AppError>) -> (StatusCode, Value) {
    let response = err.into().into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn envelope(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

#[tokio::test]
async fn test_coupon_rejections_are_bad_requests() {
    let (status, body) = render(CouponError::MinimumNotMet(dec("500.00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        envelope("Minimum order amount of 500.00 required to use this coupon")
    );

    let (status, body) = render(CouponError::DuplicateCode).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, envelope("Coupon code already exists"));
}

#[tokio::test]
async fn test_coupon_failure_during_checkout_keeps_its_message() {
    let (status, body) = render(CheckoutError::Coupon(CouponError::Expired)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, envelope("This coupon has expired"));
}

#[tokio::test]
async fn test_stock_conflict_is_409() {
    let (status, body) = render(CheckoutError::Conflict(
        "Insufficient stock for Royal Asante Kente (1 available)".to_string(),
    ))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        envelope("Insufficient stock for Royal Asante Kente (1 available)")
    );
}

#[tokio::test]
async fn test_credentials_errors_do_not_reveal_which_part_failed() {
    let (status, wrong_password) = render(AuthError::InvalidCredentials).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, unknown_user) = render(AuthError::UserNotFound).await;
    assert_eq!(wrong_password, unknown_user);
}

#[tokio::test]
async fn test_not_found_families() {
    let (status, body) = render(PaymentError::NotFound("Payment")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, envelope("Payment not found"));

    let (status, _) = render(CheckoutError::NotFound).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = render(RepositoryError::NotFound).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = render(AppError::NotFound("Route /nope not found".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, envelope("Route /nope not found"));
}

#[tokio::test]
async fn test_internal_details_are_hidden() {
    let (status, body) = render(RepositoryError::DataCorruption(
        "orders.total is NULL for AGP-20260314-7QX2M9".to_string(),
    ))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, envelope("Internal server error"));

    let (status, body) = render(CatalogError::Repository(RepositoryError::DataCorruption(
        "bad dimensions json".to_string(),
    )))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, envelope("Internal server error"));
}

#[tokio::test]
async fn test_gateway_errors() {
    let (status, body) = render(PaystackError::InvalidSignature).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, envelope("Invalid signature"));

    let (status, body) = render(PaymentError::Gateway(PaystackError::Api {
        status: 400,
        message: "Transaction reference not found".to_string(),
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, envelope("Transaction reference not found"));

    let (status, body) = render(PaystackError::Api {
        status: 503,
        message: "upstream unavailable".to_string(),
    })
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, envelope("Payment service error"));
}

#[tokio::test]
async fn test_rate_limited() {
    let (status, body) = render(AppError::RateLimited).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, envelope("Too many requests, please try again later"));
}
