//! Checkout pricing end to end: catalog lines, coupon rules and order totals.
//!
//! These run without a database; they exercise the same functions
//! `OrderService::create` and `POST /coupons/apply` use.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use agape_core::{CouponType, OrderStatus};
use agape_integration_tests::{catalog_line, coupon, dec, variant_line};
use agape_storefront::models::ShippingRates;
use agape_storefront::services::checkout::{compute_totals, price_line, subtotal};
use agape_storefront::services::coupons::evaluate;
use agape_storefront::services::{CheckoutError, CouponError};

// ============================================================================
// Catalog Pricing
// ============================================================================

#[test]
fn test_cart_with_variant_prices_from_catalog() {
    let asante = catalog_line(1, "Royal Asante Kente", dec("450.00"), 8);
    let ewe = catalog_line(2, "Ewe Kente Masterpiece", dec("520.00"), 5);
    let ewe_large = variant_line(&ewe, 7, "Large", dec("30.00"), 2);

    let lines = vec![
        price_line(&asante, 2).unwrap(),
        price_line(&ewe_large, 1).unwrap(),
    ];

    assert_eq!(lines[0].line_total, dec("900.00"));
    assert_eq!(lines[1].title, "Ewe Kente Masterpiece - Large");
    assert_eq!(lines[1].sku, "KNT-002-7");
    assert_eq!(lines[1].unit_price, dec("550.00"));
    assert_eq!(subtotal(&lines), dec("1450.00"));
}

#[test]
fn test_variant_stock_limits_quantity_not_product_inventory() {
    let ewe = catalog_line(2, "Ewe Kente Masterpiece", dec("520.00"), 5);
    let ewe_large = variant_line(&ewe, 7, "Large", dec("30.00"), 2);

    let err = price_line(&ewe_large, 3).unwrap_err();
    assert!(matches!(err, CheckoutError::Conflict(_)));
    assert_eq!(
        err.to_string(),
        "Insufficient stock for Ewe Kente Masterpiece - Large (2 available)"
    );
}

#[test]
fn test_inactive_product_cannot_be_ordered() {
    let mut line = catalog_line(4, "Traditional Wedding Kente", dec("850.00"), 4);
    line.is_active = false;

    let err = price_line(&line, 1).unwrap_err();
    assert!(matches!(err, CheckoutError::Invalid(_)));
    assert_eq!(err.to_string(), "Traditional Wedding Kente is no longer available");
}

// ============================================================================
// Totals With Coupons
// ============================================================================

#[test]
fn test_percentage_coupon_on_large_cart_ships_free() {
    let rates = ShippingRates::default();
    let sub = dec("1450.00");
    let shipping_fee = rates.shipping_for(sub);
    assert_eq!(shipping_fee, Decimal::ZERO);

    let ten_off = coupon("WELCOME10", CouponType::Percentage, dec("10"));
    let applied = evaluate(&ten_off, sub, shipping_fee, Utc::now(), Some(0)).unwrap();
    assert_eq!(applied.discount, dec("145.00"));
    assert!(!applied.free_shipping);

    let totals = compute_totals(sub, &rates, Some(&applied));
    assert_eq!(totals.discount, dec("145.00"));
    assert_eq!(totals.shipping, Decimal::ZERO);
    assert_eq!(totals.total, dec("1305.00"));
}

#[test]
fn test_free_shipping_coupon_waives_delivery_fee() {
    let rates = ShippingRates::default();
    let sub = dec("420.00");
    let shipping_fee = rates.shipping_for(sub);
    assert_eq!(shipping_fee, dec("50"));

    let free = coupon("SHIPFREE", CouponType::FreeShipping, Decimal::ZERO);
    let applied = evaluate(&free, sub, shipping_fee, Utc::now(), None).unwrap();
    assert!(applied.free_shipping);
    assert_eq!(applied.discount, Decimal::ZERO);
    assert_eq!(applied.shipping_discount, dec("50"));

    let totals = compute_totals(sub, &rates, Some(&applied));
    assert_eq!(totals.shipping, Decimal::ZERO);
    assert_eq!(totals.shipping_discount, dec("50"));
    assert_eq!(totals.total, dec("420.00"));
}

#[test]
fn test_fixed_coupon_never_makes_goods_negative() {
    let rates = ShippingRates::default();
    let sub = dec("60.00");

    let hundred_off = coupon("FLAT100", CouponType::Fixed, dec("100"));
    let applied =
        evaluate(&hundred_off, sub, rates.shipping_for(sub), Utc::now(), Some(0)).unwrap();
    assert_eq!(applied.discount, dec("60.00"));

    // Delivery is still charged
    let totals = compute_totals(sub, &rates, Some(&applied));
    assert_eq!(totals.total, dec("50"));
}

#[test]
fn test_no_coupon_small_cart_pays_delivery() {
    let totals = compute_totals(dec("500.00"), &ShippingRates::default(), None);
    assert_eq!(totals.discount, Decimal::ZERO);
    assert_eq!(totals.shipping, dec("50"));
    assert_eq!(totals.total, dec("550.00"));
}

// ============================================================================
// Coupon Rules
// ============================================================================

#[test]
fn test_minimum_order_message_includes_amount() {
    let mut c = coupon("BIGSPEND", CouponType::Fixed, dec("50"));
    c.min_order_amount = dec("500.00");

    let err = evaluate(&c, dec("420.00"), dec("50"), Utc::now(), Some(0)).unwrap_err();
    assert!(matches!(err, CouponError::MinimumNotMet(_)));
    assert_eq!(
        err.to_string(),
        "Minimum order amount of 500.00 required to use this coupon"
    );
}

#[test]
fn test_inactive_is_reported_before_expiry() {
    let mut c = coupon("OLD", CouponType::Percentage, dec("5"));
    c.is_active = false;
    c.expires_at = Some(Utc::now() - Duration::days(1));

    let err = evaluate(&c, dec("100"), dec("50"), Utc::now(), None).unwrap_err();
    assert!(matches!(err, CouponError::Inactive));
}

#[test]
fn test_expired_coupon_is_rejected() {
    let mut c = coupon("EASTER", CouponType::Percentage, dec("5"));
    c.expires_at = Some(Utc::now() - Duration::days(1));

    let err = evaluate(&c, dec("100"), dec("50"), Utc::now(), None).unwrap_err();
    assert_eq!(err.to_string(), "This coupon has expired");
}

#[test]
fn test_global_and_per_user_limits() {
    let mut c = coupon("LIMITED", CouponType::Percentage, dec("15"));
    c.usage_limit = Some(10);
    c.used_count = 10;
    let err = evaluate(&c, dec("100"), dec("50"), Utc::now(), Some(0)).unwrap_err();
    assert!(matches!(err, CouponError::UsageLimitReached));

    c.used_count = 3;
    let err = evaluate(&c, dec("100"), dec("50"), Utc::now(), Some(1)).unwrap_err();
    assert!(matches!(err, CouponError::UserLimitReached));

    // Anonymous validation skips the per-user check
    assert!(evaluate(&c, dec("100"), dec("50"), Utc::now(), None).is_ok());
}

// ============================================================================
// Order Lifecycle
// ============================================================================

#[test]
fn test_order_lifecycle_transitions() {
    let happy_path = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    for pair in happy_path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
    }

    assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Delivered));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
}
