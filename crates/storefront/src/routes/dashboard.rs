//! Admin dashboard API handlers.

use axum::{
    Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::response::ApiResponse;
use crate::db::DashboardRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::dashboard::{DashboardStats, TrendPeriod};
use crate::services::CouponService;
use crate::state::AppState;

/// Most periods a trends request may ask for.
pub const MAX_TREND_POINTS: i64 = 90;

const DEFAULT_TREND_POINTS: i64 = 30;

/// Build the dashboard router, nested at `/admin/dashboard`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/trends", get(trends))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    #[serde(default)]
    pub period: TrendPeriod,
    pub limit: Option<i64>,
}

fn trend_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_TREND_POINTS).clamp(1, MAX_TREND_POINTS)
}

/// Store totals, optionally limited to orders placed in `[from, to]`.
///
/// # Errors
///
/// Returns 400 if `from` is after `to`.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse> {
    if let (Some(from), Some(to)) = (query.from, query.to)
        && from > to
    {
        return Err(AppError::BadRequest(
            "`from` must not be after `to`".to_string(),
        ));
    }

    let dashboard = DashboardRepository::new(state.pool());
    let orders = dashboard.order_stats(query.from, query.to).await?;
    let (total_users, active_products, low_stock_products) = dashboard.catalog_counts().await?;
    let coupons = CouponService::new(state.pool()).stats().await?;

    Ok(ApiResponse::ok(DashboardStats {
        orders,
        total_users,
        active_products,
        low_stock_products,
        coupons,
        from: query.from,
        to: query.to,
    }))
}

/// Orders and revenue per day, week, or month.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn trends(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<TrendsQuery>,
) -> Result<impl IntoResponse> {
    let limit = trend_limit(query.limit);
    let points = DashboardRepository::new(state.pool())
        .trends(query.period, limit)
        .await?;
    Ok(ApiResponse::ok(json!({
        "period": query.period,
        "points": points,
    })))
}
