//! Payment API handlers.
//!
//! The webhook and callback routes are unauthenticated: the webhook is
//! trusted only after its HMAC signature checks out, and the callback only
//! redirects the browser back to the frontend.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use agape_core::{OrderId, PaymentId, PaymentStatus};

use super::response::ApiResponse;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::services::PaymentService;
use crate::services::payments::{WebhookOutcome, callback_redirect};
use crate::services::paystack::WebhookEvent;
use crate::state::AppState;

/// Header carrying the webhook HMAC.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/initialize", post(initialize))
        .route("/verify/{reference}", get(verify))
        .route("/webhook", post(webhook))
        .route("/callback", get(callback))
        .route("/{id}", get(show))
        .route("/{id}/refund", post(refund))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

fn parse_payment_id(raw: &str) -> Result<PaymentId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid payment id".to_string()))
}

fn service(state: &AppState) -> PaymentService<'_> {
    PaymentService::new(
        state.pool(),
        state.paystack(),
        &state.config().paystack.callback_url,
    )
}

/// Start a Paystack checkout for one of the caller's orders.
///
/// # Errors
///
/// Returns 404 for an unknown order, 400 if it can't be paid, and 502 if
/// Paystack is unavailable.
#[instrument(skip_all)]
pub async fn initialize(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<InitializeRequest>,
) -> Result<impl IntoResponse> {
    let init = service(&state).initialize(&user, body.order_id).await?;
    add_breadcrumb(
        "payment",
        "Payment initialized",
        &[("reference", &init.reference)],
    );
    Ok(ApiResponse::ok(init).message("Payment initialized successfully"))
}

/// Check a transaction with Paystack and settle it if it succeeded.
///
/// # Errors
///
/// Returns 404 for an unknown or foreign reference and 502 if Paystack is
/// unavailable.
#[instrument(skip(state, user))]
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let verification = service(&state).verify(&user, &reference).await?;
    Ok(ApiResponse::ok(verification).message("Payment verified successfully"))
}

/// Paystack webhook.
///
/// Only a bad signature is rejected. Every correctly signed delivery is
/// acknowledged with 200, including events we don't act on.
///
/// # Errors
///
/// Returns 401 if the signature is missing or doesn't match.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.paystack().verify_webhook(&body, signature).inspect_err(|_| {
        tracing::warn!(bytes = body.len(), "Rejected webhook with invalid signature");
    })?;

    let ack = (StatusCode::OK, Json(json!({ "status": "success" })));

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable Paystack webhook");
            return Ok(ack);
        }
    };
    add_breadcrumb("payment", "Paystack webhook", &[("event", &event.event)]);

    match service(&state).handle_webhook(&event).await {
        Ok(WebhookOutcome::Settled) => tracing::info!(event = %event.event, "Webhook settled payment"),
        Ok(WebhookOutcome::UnknownReference) => {
            tracing::warn!(event = %event.event, "Webhook for unknown payment reference");
        }
        Ok(outcome) => tracing::debug!(event = %event.event, ?outcome, "Webhook acknowledged"),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Webhook settlement failed");
        }
    }
    Ok(ack)
}

/// Browser return from the Paystack checkout page.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let reference = query
        .reference
        .or(query.trxref)
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Payment reference is required".to_string()))?;
    Ok(Redirect::to(&callback_redirect(
        &state.config().frontend_url,
        &reference,
    )))
}

/// Payments newest first. Customers see only their own.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PaymentListQuery>,
) -> Result<impl IntoResponse> {
    let payments = service(&state)
        .list(&user, query.status, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(payments))
}

/// # Errors
///
/// Returns 404 if the payment doesn't exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_payment_id(&id)?;
    Ok(ApiResponse::ok(service(&state).get(&user, id).await?))
}

/// Refund all or part of a successful payment.
///
/// # Errors
///
/// Returns 400 for a bad amount or non-refundable payment, 404 for an unknown
/// payment, and 502 if Paystack refuses.
#[instrument(skip(state, admin, body))]
pub async fn refund(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    body: Option<Json<RefundRequest>>,
) -> Result<impl IntoResponse> {
    let id = parse_payment_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let payment = service(&state)
        .refund(id, body.amount, body.reason.as_deref())
        .await?;
    tracing::info!(admin_id = %admin.id, payment_id = %id, "Refund issued by admin");
    Ok(ApiResponse::ok(payment).message("Payment refunded successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header::LOCATION};
    use tower::ServiceExt;

    use super::*;
    use crate::services::paystack::sign_webhook;

    fn app() -> Router {
        router().with_state(AppState::for_tests())
    }

    fn webhook_request(body: &'static str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/webhook").header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_signature() {
        let response = app()
            .oneshot(webhook_request(r#"{"event":"charge.success"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_rejects_wrong_signature() {
        let body = r#"{"event":"charge.success","data":{}}"#;
        let forged = sign_webhook(b"not-the-secret", body.as_bytes());
        let response = app()
            .oneshot(webhook_request(body, Some(&forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unhandled_events() {
        let body = r#"{"event":"transfer.success","data":{"reference":"x"}}"#;
        let signature = sign_webhook(b"sk_test_super_secret_value", body.as_bytes());
        let response = app()
            .oneshot(webhook_request(body, Some(&signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unparseable_body() {
        let body = "not json";
        let signature = sign_webhook(b"sk_test_super_secret_value", body.as_bytes());
        let response = app()
            .oneshot(webhook_request(body, Some(&signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_callback_redirects_with_trxref() {
        let response = app()
            .oneshot(
                Request::get("/callback?trxref=AGP-PAY-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "http://localhost:3000/checkout/success?reference=AGP-PAY-abc"
        );
    }

    #[tokio::test]
    async fn test_callback_requires_reference() {
        let response = app()
            .oneshot(Request::get("/callback").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
