//! Order API handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use agape_core::{OrderId, OrderStatus};

use super::response::{ApiResponse, PageQuery};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::order::NewOrder;
use crate::services::OrderService;
use crate::state::AppState;

/// Customer order routes, nested at `/orders`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
}

/// Admin order routes, nested at `/admin/orders`.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_index))
        .route("/{id}/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

fn parse_order_id(raw: &str) -> Result<OrderId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid order id".to_string()))
}

/// Place an order from the submitted lines.
///
/// # Errors
///
/// Returns 400 for invalid lines, unavailable products, or a rejected coupon,
/// and 409 when stock runs out mid-checkout.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<NewOrder>,
) -> Result<impl IntoResponse> {
    let order = OrderService::new(state.pool())
        .create(&user, &body, state.config().currency)
        .await?;
    Ok(ApiResponse::created(order).message("Order created successfully"))
}

/// The caller's orders, newest first.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.pool())
        .list_mine(user.id, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// # Errors
///
/// Returns 404 if the order doesn't exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_order_id(&id)?;
    let order = OrderService::new(state.pool()).get(&user, id).await?;
    Ok(ApiResponse::ok(order))
}

/// # Errors
///
/// Returns 404 for unknown or foreign orders and 400 once the order has
/// moved past `pending`.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_order_id(&id)?;
    let order = OrderService::new(state.pool()).cancel(user.id, id).await?;
    Ok(ApiResponse::ok(order).message("Order cancelled successfully"))
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<AdminOrderQuery>,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.pool())
        .list_all(query.status, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// # Errors
///
/// Returns 404 for unknown orders and 400 for a transition outside the
/// lifecycle.
#[instrument(skip(state, admin, body))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_order_id(&id)?;
    let order = OrderService::new(state.pool())
        .update_status(id, body.status)
        .await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, status = %order.status, "Order status updated by admin");
    Ok(ApiResponse::ok(order).message("Order status updated successfully"))
}
