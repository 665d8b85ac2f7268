//! Integration tests for Agape Looks.
//!
//! # Running Tests
//!
//! ```bash
//! # Pure checkout, coupon, webhook and error-envelope tests
//! cargo test -p agape-integration-tests
//!
//! # Include the HTTP tests against a running storefront
//! STOREFRONT_BASE_URL=http://localhost:4000 \
//!     cargo test -p agape-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_pricing` - catalog pricing, coupons and order totals together
//! - `webhook_signatures` - Paystack signature checks on real payloads
//! - `error_envelope` - HTTP status and body for every error family
//! - `payment_settlement` - settlement against a migrated database
//! - `storefront_api` - end-to-end requests against a running server

use std::str::FromStr;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use agape_core::{CouponId, CouponType, ProductId, VariantId};
use agape_storefront::models::coupon::Coupon;
use agape_storefront::models::order::CatalogLine;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Versioned API URL for `path`, e.g. `api_url("/products")`.
#[must_use]
pub fn api_url(path: &str) -> String {
    format!("{}/api/v1{path}", storefront_base_url())
}

/// HTTP client that keeps the refresh cookie between requests.
///
/// # Panics
///
/// Panics if the TLS backend can't be initialised.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Unique email so repeated runs don't collide on registration.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// Decimal from a literal like `"450.00"`.
///
/// # Panics
///
/// Panics on malformed input.
#[must_use]
#[allow(clippy::expect_used)]
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal literal")
}

/// An active coupon with no limits, as an admin would create it.
#[must_use]
pub fn coupon(code: &str, coupon_type: CouponType, amount_or_pct: Decimal) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: CouponId::new(1),
        code: code.to_string(),
        coupon_type,
        amount_or_pct,
        min_order_amount: Decimal::ZERO,
        expires_at: None,
        usage_limit: None,
        used_count: 0,
        per_user_limit: 1,
        description: None,
        is_active: true,
        metadata: json!({}),
        created_at: now,
        updated_at: now,
    }
}

/// Catalog row for a product without variants.
#[must_use]
pub fn catalog_line(id: i32, title: &str, price: Decimal, inventory: i32) -> CatalogLine {
    CatalogLine {
        product_id: ProductId::new(id),
        title: title.to_string(),
        sku: format!("KNT-{id:03}"),
        price,
        inventory,
        is_active: true,
        variant_id: None,
        variant_name: None,
        variant_sku: None,
        price_delta: None,
        variant_stock: None,
    }
}

/// Catalog row for one variant of a product.
#[must_use]
pub fn variant_line(
    base: &CatalogLine,
    variant: i32,
    name: &str,
    delta: Decimal,
    stock: i32,
) -> CatalogLine {
    CatalogLine {
        variant_id: Some(VariantId::new(variant)),
        variant_name: Some(name.to_string()),
        variant_sku: Some(format!("{}-{variant}", base.sku)),
        price_delta: Some(delta),
        variant_stock: Some(stock),
        ..base.clone()
    }
}

/// Paystack `charge.success` payload for `reference`.
#[must_use]
pub fn charge_success(reference: &str, amount_minor: i64, paid_at: DateTime<Utc>) -> Value {
    json!({
        "event": "charge.success",
        "data": {
            "id": 302_961,
            "domain": "test",
            "status": "success",
            "reference": reference,
            "amount": amount_minor,
            "currency": "GHS",
            "gateway_response": "Successful",
            "paid_at": paid_at.to_rfc3339(),
            "channel": "card",
            "customer": {"email": "ama@example.com"}
        }
    })
}
