//! Coupon API handlers.
//!
//! `apply` and `validate` are public (auth optional; a signed-in caller also
//! gets the per-user limit checked). Everything else is admin-only.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use agape_core::CouponId;

use super::response::ApiResponse;
use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::coupon::{CouponListFilter, CouponPatch, NewCoupon};
use crate::services::CouponService;
use crate::state::AppState;

/// Build the coupons router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/apply", post(apply))
        .route("/validate/{code}", post(validate))
        .route("/stats", get(stats))
        .route("/", get(index).post(create))
        .route("/{id}", get(show).patch(update).delete(destroy))
        .route("/{id}/usage", get(usage))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub code: String,
    pub cart_subtotal: Decimal,
    /// Defaults to the store delivery fee for this subtotal.
    pub shipping_fee: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub cart_subtotal: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_coupon_id(raw: &str) -> Result<CouponId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid coupon id".to_string()))
}

fn check_subtotal(subtotal: Decimal) -> Result<()> {
    if subtotal.is_sign_negative() {
        return Err(AppError::BadRequest(
            "Cart subtotal must not be negative".to_string(),
        ));
    }
    Ok(())
}

async fn shipping_fee_for(state: &AppState, subtotal: Decimal) -> Result<Decimal> {
    let rates = SettingsRepository::new(state.pool()).shipping_rates().await?;
    Ok(rates.shipping_for(subtotal))
}

/// Price a coupon against a cart.
///
/// # Errors
///
/// Returns 404 for an unknown code and 400 for any failing rule.
pub async fn apply(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<ApplyRequest>,
) -> Result<impl IntoResponse> {
    check_subtotal(body.cart_subtotal)?;
    let shipping_fee = match body.shipping_fee {
        Some(fee) => fee.max(Decimal::ZERO),
        None => shipping_fee_for(&state, body.cart_subtotal).await?,
    };

    let application = CouponService::new(state.pool())
        .apply(
            &body.code,
            body.cart_subtotal,
            shipping_fee,
            user.map(|u| u.id),
        )
        .await?;
    Ok(ApiResponse::ok(application).message("Coupon applied successfully"))
}

/// # Errors
///
/// Returns 404 for an unknown code and 400 for any failing rule.
pub async fn validate(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(code): Path<String>,
    Json(body): Json<ValidateRequest>,
) -> Result<impl IntoResponse> {
    check_subtotal(body.cart_subtotal)?;
    let shipping_fee = shipping_fee_for(&state, body.cart_subtotal).await?;

    let application = CouponService::new(state.pool())
        .apply(&code, body.cart_subtotal, shipping_fee, user.map(|u| u.id))
        .await?;
    Ok(ApiResponse::ok(application).message("Coupon is valid"))
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<CouponListFilter>,
) -> Result<impl IntoResponse> {
    let coupons = CouponService::new(state.pool()).list(&filter).await?;
    let (limit, offset) = filter.bounds();
    Ok(ApiResponse::ok(json!({
        "coupons": coupons,
        "limit": limit,
        "offset": offset,
    })))
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    Ok(ApiResponse::ok(CouponService::new(state.pool()).stats().await?))
}

/// # Errors
///
/// Returns 400 for invalid input and 409 for a duplicate code.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewCoupon>,
) -> Result<impl IntoResponse> {
    let coupon = CouponService::new(state.pool()).create(&body).await?;
    tracing::info!(admin_id = %admin.id, code = %coupon.code, "Coupon created by admin");
    Ok(ApiResponse::created(coupon).message("Coupon created successfully"))
}

/// # Errors
///
/// Returns 404 if the coupon doesn't exist.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_coupon_id(&id)?;
    Ok(ApiResponse::ok(CouponService::new(state.pool()).get(id).await?))
}

/// # Errors
///
/// Returns 400 for an empty or invalid patch and 404 if the coupon doesn't
/// exist.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Json(body): Json<CouponPatch>,
) -> Result<impl IntoResponse> {
    let id = parse_coupon_id(&id)?;
    let coupon = CouponService::new(state.pool()).update(id, &body).await?;
    Ok(ApiResponse::ok(coupon).message("Coupon updated successfully"))
}

/// # Errors
///
/// Returns 404 if the coupon doesn't exist.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_coupon_id(&id)?;
    CouponService::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::ok(json!({ "id": id })).message("Coupon deleted successfully"))
}

/// # Errors
///
/// Returns 404 if the coupon doesn't exist.
pub async fn usage(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<impl IntoResponse> {
    let id = parse_coupon_id(&id)?;
    let history = CouponService::new(state.pool())
        .usage_history(id, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(ApiResponse::ok(history))
}
