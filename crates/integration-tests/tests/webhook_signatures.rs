//! Paystack webhook signature checks on realistic payloads.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use secrecy::SecretString;

use agape_integration_tests::charge_success;
use agape_storefront::config::PaystackConfig;
use agape_storefront::services::paystack::{WebhookEvent, sign_webhook, verify_signature};
use agape_storefront::services::payments::callback_redirect;
use agape_storefront::services::{PaystackClient, PaystackError};

const SECRET: &str = "sk_test_4f1c2d3e5a6b7c8d9e0f";

fn client() -> PaystackClient {
    PaystackClient::new(&PaystackConfig {
        base_url: "https://api.paystack.co".to_string(),
        secret_key: SecretString::from(SECRET),
        callback_url: "http://localhost:4000/api/v1/payments/callback".to_string(),
    })
    .unwrap()
}

fn payload() -> Vec<u8> {
    let paid_at = Utc.with_ymd_and_hms(2026, 3, 14, 10, 30, 0).unwrap();
    serde_json::to_vec(&charge_success("AGP-PAY-7QX2M9", 130_500, paid_at)).unwrap()
}

#[test]
fn test_client_accepts_signature_from_secret_key() {
    let body = payload();
    let signature = sign_webhook(SECRET.as_bytes(), &body);
    assert!(client().verify_webhook(&body, &signature).is_ok());
}

#[test]
fn test_signature_is_case_insensitive_hex() {
    let body = payload();
    let signature = sign_webhook(SECRET.as_bytes(), &body).to_uppercase();
    assert!(verify_signature(SECRET.as_bytes(), &body, &signature).is_ok());
}

#[test]
fn test_tampered_amount_is_rejected() {
    let body = payload();
    let signature = sign_webhook(SECRET.as_bytes(), &body);

    let tampered = String::from_utf8(body)
        .unwrap()
        .replace("130500", "100");
    let err = client()
        .verify_webhook(tampered.as_bytes(), &signature)
        .unwrap_err();
    assert!(matches!(err, PaystackError::InvalidSignature));
}

#[test]
fn test_signature_from_another_key_is_rejected() {
    let body = payload();
    let signature = sign_webhook(b"sk_test_someone_else", &body);
    assert!(client().verify_webhook(&body, &signature).is_err());
}

#[test]
fn test_malformed_signatures_are_rejected() {
    let body = payload();
    for signature in ["", "not-hex", "abcd"] {
        let err = client().verify_webhook(&body, signature).unwrap_err();
        assert!(matches!(err, PaystackError::InvalidSignature), "{signature:?}");
    }
}

#[test]
fn test_signed_payload_parses_into_transaction() {
    let event: WebhookEvent = serde_json::from_slice(&payload()).unwrap();
    assert_eq!(event.event, "charge.success");

    let tx = event.transaction().unwrap();
    assert_eq!(tx.reference, "AGP-PAY-7QX2M9");
    assert_eq!(tx.amount, 130_500);
    assert_eq!(tx.currency.as_deref(), Some("GHS"));
    assert!(tx.is_success());
    assert_eq!(
        tx.paid_at,
        Some(Utc.with_ymd_and_hms(2026, 3, 14, 10, 30, 0).unwrap())
    );
}

#[test]
fn test_callback_redirect_escapes_reference() {
    assert_eq!(
        callback_redirect("https://agapelooks.com/", "AGP PAY/1"),
        "https://agapelooks.com/checkout/success?reference=AGP%20PAY%2F1"
    );
}
