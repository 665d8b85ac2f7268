//! Payment settlement against a real database.
//!
//! ```bash
//! AGAPE_DATABASE_URL=postgres://localhost/agape_test \
//!     cargo test -p agape-integration-tests --test payment_settlement -- --include-ignored
//! ```

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use secrecy::SecretString;
use serde_json::json;
use sqlx::PgPool;

use agape_core::{
    Email, OrderId, OrderPaymentStatus, OrderStatus, PaymentStatus, UserId, UserRole,
};
use agape_integration_tests::{charge_success, dec, unique_email};
use agape_storefront::config::{PaystackConfig, database_url_from_env};
use agape_storefront::db::payments::NewPayment;
use agape_storefront::db::{
    self, OrderRepository, PaymentRepository, ProductRepository, UserRepository,
};
use agape_storefront::models::CurrentUser;
use agape_storefront::models::order::{OrderDraft, OrderTotals, PricedLine};
use agape_storefront::models::product::NewProduct;
use agape_storefront::services::checkout::generate_order_number;
use agape_storefront::services::payments::{WebhookOutcome, generate_reference};
use agape_storefront::services::paystack::WebhookEvent;
use agape_storefront::services::{PaymentError, PaymentService, PaystackClient};

fn gateway() -> PaystackClient {
    PaystackClient::new(&PaystackConfig {
        base_url: "https://api.paystack.co".to_string(),
        secret_key: SecretString::from("sk_test_settlement"),
        callback_url: "http://localhost:4000/api/v1/payments/callback".to_string(),
    })
    .unwrap()
}

/// A pending order for one unit of a fresh product, with its pending payment.
async fn pending_payment(pool: &PgPool) -> (OrderId, String) {
    let email = Email::parse(&unique_email()).unwrap();
    let user = UserRepository::new(pool)
        .create(&email, "Ama Mensah", None, UserRole::Customer, "unused-hash")
        .await
        .unwrap();

    let sku = format!("IT-{}", uuid::Uuid::new_v4().simple());
    let input: NewProduct = serde_json::from_value(json!({
        "sku": sku,
        "title": "Royal Asante Kente",
        "price": "450.00",
        "inventory": 3,
    }))
    .unwrap();
    let product = ProductRepository::new(pool)
        .create(&input, &sku.to_lowercase(), None)
        .await
        .unwrap();

    let price = dec("450.00");
    let order = OrderRepository::new(pool)
        .create(&OrderDraft {
            order_number: generate_order_number(Utc::now()),
            user_id: user.id,
            totals: OrderTotals {
                subtotal: price,
                discount: dec("0"),
                shipping: dec("50"),
                shipping_discount: dec("0"),
                total: dec("500.00"),
            },
            currency: "GHS".to_string(),
            coupon_id: None,
            shipping_address: json!({"fullName": "Ama Mensah", "city": "Accra"}),
            metadata: json!({}),
            lines: vec![PricedLine {
                product_id: product.id,
                variant_id: None,
                title: product.title.clone(),
                sku: product.sku.clone(),
                unit_price: price,
                quantity: 1,
                line_total: price,
            }],
        })
        .await
        .unwrap();

    let reference = generate_reference();
    PaymentRepository::new(pool)
        .create(&NewPayment {
            order_id: order.id,
            user_id: user.id,
            reference: &reference,
            amount: order.total,
            currency: "GHS",
            authorization_url: "https://checkout.paystack.com/test",
            access_code: "test-access",
        })
        .await
        .unwrap();

    (order.id, reference)
}

fn charge_event(reference: &str) -> WebhookEvent {
    serde_json::from_value(charge_success(reference, 50_000, Utc::now())).unwrap()
}

#[tokio::test]
#[ignore = "Requires a migrated storefront database"]
async fn test_charge_success_after_failed_attempt_marks_order_paid() {
    let pool = db::create_pool(&database_url_from_env().unwrap())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    let (order_id, reference) = pending_payment(&pool).await;

    let failed = PaymentRepository::new(&pool)
        .mark_failed(&reference, Some("Declined"))
        .await
        .unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    let gateway = gateway();
    let service = PaymentService::new(&pool, &gateway, "http://localhost:3000");
    let outcome = service
        .handle_webhook(&charge_event(&reference))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Settled);

    let order = OrderRepository::new(&pool).get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_status, OrderPaymentStatus::Completed);

    let payment = PaymentRepository::new(&pool)
        .get_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
}

#[tokio::test]
#[ignore = "Requires a migrated storefront database"]
async fn test_repeated_charge_success_is_a_no_op() {
    let pool = db::create_pool(&database_url_from_env().unwrap())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    let (order_id, reference) = pending_payment(&pool).await;

    let gateway = gateway();
    let service = PaymentService::new(&pool, &gateway, "http://localhost:3000");
    let event = charge_event(&reference);

    assert_eq!(
        service.handle_webhook(&event).await.unwrap(),
        WebhookOutcome::Settled
    );
    let first = PaymentRepository::new(&pool)
        .get_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        service.handle_webhook(&event).await.unwrap(),
        WebhookOutcome::AlreadySettled
    );
    let second = PaymentRepository::new(&pool)
        .get_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.paid_at, second.paid_at);
    assert_eq!(first.updated_at, second.updated_at);

    let order = OrderRepository::new(&pool).get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
#[ignore = "Requires a migrated storefront database"]
async fn test_verify_foreign_reference_never_reaches_gateway() {
    let pool = db::create_pool(&database_url_from_env().unwrap())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    let (_, reference) = pending_payment(&pool).await;

    // Nothing listens here, so any gateway call would surface as a Gateway error
    let unreachable = PaystackClient::new(&PaystackConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        secret_key: SecretString::from("sk_test_settlement"),
        callback_url: "http://localhost:4000/api/v1/payments/callback".to_string(),
    })
    .unwrap();
    let service = PaymentService::new(&pool, &unreachable, "http://localhost:3000");

    let stranger = CurrentUser {
        id: UserId::new(i32::MAX),
        email: "stranger@example.com".to_string(),
        role: UserRole::Customer,
    };
    let result = service.verify(&stranger, &reference).await;
    assert!(matches!(result, Err(PaymentError::NotFound("Payment"))));

    let payment = PaymentRepository::new(&pool)
        .get_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}
