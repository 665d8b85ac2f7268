//! Paystack API client.
//!
//! Wraps the three transaction endpoints the store uses (initialize, verify,
//! refund) and webhook signature verification. Amounts on the wire are in
//! minor units (pesewas/kobo).

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha512;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::PaystackConfig;

type HmacSha512 = Hmac<Sha512>;

/// Request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when interacting with the Paystack API.
#[derive(Debug, Error)]
pub enum PaystackError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook signature missing or wrong.
    #[error("invalid webhook signature")]
    InvalidSignature,
}

/// Paystack's response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    currency: &'a str,
    callback_url: &'a str,
    metadata: &'a Value,
}

/// Hosted checkout session returned by `transaction/initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Transaction state returned by `transaction/verify` and carried in
/// `charge.*` webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub reference: String,
    /// `success`, `failed`, `abandoned`, `ongoing`, ...
    pub status: String,
    /// Minor units.
    pub amount: i64,
    pub currency: Option<String>,
    pub gateway_response: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Transaction {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    transaction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merchant_note: Option<&'a str>,
}

/// Refund record returned by `refund`.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: Option<i64>,
    pub status: Option<String>,
    /// Minor units.
    pub amount: Option<i64>,
}

/// A webhook event. Only `charge.success` changes state.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// The transaction carried by a `charge.*` event.
    ///
    /// # Errors
    ///
    /// Returns `PaystackError::Parse` if the payload isn't a transaction.
    pub fn transaction(&self) -> Result<Transaction, PaystackError> {
        serde_json::from_value(self.data.clone()).map_err(|e| PaystackError::Parse(e.to_string()))
    }
}

/// Paystack API client.
#[derive(Clone)]
pub struct PaystackClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaystackClient {
    /// Create a new Paystack client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaystackConfig) -> Result<Self, PaystackError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaystackError::Parse(format!("Invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Start a hosted checkout.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Paystack declines.
    #[instrument(skip(self, email, metadata), fields(reference = %reference))]
    pub async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
        currency: &str,
        callback_url: &str,
        metadata: &Value,
    ) -> Result<Authorization, PaystackError> {
        let body = InitializeRequest {
            email,
            amount: amount_minor,
            reference,
            currency,
            callback_url,
            metadata,
        };
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Look up a transaction's current state.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn verify(&self, reference: &str) -> Result<Transaction, PaystackError> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                self.base_url,
                urlencoding::encode(reference)
            ))
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Refund a transaction, fully or partially.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Paystack declines.
    #[instrument(skip(self, note))]
    pub async fn refund(
        &self,
        reference: &str,
        amount_minor: Option<i64>,
        note: Option<&str>,
    ) -> Result<Refund, PaystackError> {
        let body = RefundRequest {
            transaction: reference,
            amount: amount_minor,
            merchant_note: note,
        };
        let response = self
            .client
            .post(format!("{}/refund", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Check an `x-paystack-signature` header against the raw request body.
    ///
    /// # Errors
    ///
    /// Returns `PaystackError::InvalidSignature` on mismatch.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<(), PaystackError> {
        verify_signature(self.secret_key.expose_secret().as_bytes(), body, signature)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaystackError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<Value>>(&text)
                .map(|e| e.message)
                .unwrap_or_else(|_| text.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Paystack returned non-success status");
            return Err(PaystackError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&text).map_err(|e| PaystackError::Parse(e.to_string()))?;
        if !envelope.status {
            return Err(PaystackError::Api {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        debug!(message = %envelope.message, "Paystack request succeeded");

        envelope
            .data
            .ok_or_else(|| PaystackError::Parse("response has no data".to_string()))
    }
}

/// Hex HMAC-SHA512 of `body` under `key`.
#[must_use]
pub fn sign_webhook(key: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length
    HmacSha512::new_from_slice(key).map_or_else(
        |_| String::new(),
        |mac| hex::encode(mac.chain_update(body).finalize().into_bytes()),
    )
}

/// Verify a hex HMAC-SHA512 webhook signature in constant time.
///
/// # Errors
///
/// Returns `PaystackError::InvalidSignature` if the signature is not valid hex
/// or does not match.
pub fn verify_signature(key: &[u8], body: &[u8], signature: &str) -> Result<(), PaystackError> {
    let provided = hex::decode(signature.trim()).map_err(|_| PaystackError::InvalidSignature)?;
    HmacSha512::new_from_slice(key)
        .map_err(|_| PaystackError::InvalidSignature)?
        .chain_update(body)
        .verify_slice(&provided)
        .map_err(|_| PaystackError::InvalidSignature)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"sk_test_0123456789abcdef";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"AGP-PAY-1"}}"#;

    #[test]
    fn test_signature_roundtrip() {
        let signature = sign_webhook(KEY, BODY);
        assert_eq!(signature.len(), 128);
        assert!(verify_signature(KEY, BODY, &signature).is_ok());
    }

    #[test]
    fn test_signature_wrong_key_rejected() {
        let signature = sign_webhook(b"sk_test_other", BODY);
        assert!(matches!(
            verify_signature(KEY, BODY, &signature),
            Err(PaystackError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signature_tampered_body_rejected() {
        let signature = sign_webhook(KEY, BODY);
        let tampered = br#"{"event":"charge.success","data":{"reference":"AGP-PAY-2"}}"#;
        assert!(verify_signature(KEY, tampered, &signature).is_err());
    }

    #[test]
    fn test_signature_garbage_rejected() {
        assert!(verify_signature(KEY, BODY, "").is_err());
        assert!(verify_signature(KEY, BODY, "zz-not-hex").is_err());
    }

    #[test]
    fn test_webhook_event_transaction() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event": "charge.success", "data": {"reference": "AGP-PAY-1",
                "status": "success", "amount": 25000, "currency": "GHS",
                "gateway_response": "Approved", "paid_at": "2026-03-01T12:00:00.000Z"}}"#,
        )
        .unwrap();
        let tx = event.transaction().unwrap();
        assert!(tx.is_success());
        assert_eq!(tx.amount, 25_000);
        assert!(tx.paid_at.is_some());
    }

    #[test]
    fn test_envelope_without_data() {
        let env: Envelope<Authorization> =
            serde_json::from_str(r#"{"status": false, "message": "Invalid key"}"#).unwrap();
        assert!(!env.status);
        assert!(env.data.is_none());
    }
}
