//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Auth (/api/v1/auth)
//! POST /register, /login, /refresh      - Credential routes (strict rate limit)
//! POST /logout   GET /me   PATCH /profile
//! POST /change-password
//! GET  /sessions   DELETE /sessions/{id}
//!
//! # Catalog
//! GET  /api/v1/products[/search|/{idOrSlug}]   POST/PATCH/DELETE (admin)
//! GET  /api/v1/collections[/{slug}]            POST/PUT/DELETE (admin)
//!
//! # Checkout
//! /api/v1/coupons        - apply, validate, admin CRUD, stats, usage
//! /api/v1/orders         - create, list, show, cancel
//! /api/v1/payments       - initialize, verify, webhook, callback, refund
//!
//! # Account
//! /api/v1/wishlist       - saved products
//!
//! # Store
//! GET  /api/v1/settings  PUT /api/v1/settings/{key} (admin)
//!
//! # Admin
//! /api/v1/admin/orders      - list, status changes
//! /api/v1/admin/dashboard   - stats, trends
//! ```

pub mod auth;
pub mod collections;
pub mod coupons;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod response;
pub mod settings;
pub mod wishlist;

use axum::{Router, http::Uri, routing::get};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

pub use response::ApiResponse;

/// Prefix for every JSON endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::admin_router())
        .nest("/dashboard", dashboard::router())
}

/// Every `/api/v1` route except the credential endpoints.
pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/collections", collections::router())
        .nest("/coupons", coupons::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/wishlist", wishlist::router())
        .nest("/settings", settings::router())
        .nest("/admin", admin_routes())
}

/// The `/api/v1` router with rate limits applied.
///
/// Credential routes get the strict limiter; everything else shares the
/// general one.
pub fn api_routes() -> Router<AppState> {
    let credentials = Router::new()
        .nest("/auth", auth::credential_router())
        .layer(auth_rate_limiter());

    resource_routes()
        .layer(api_rate_limiter())
        .merge(credentials)
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest(API_PREFIX, api_routes())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {} not found", uri.path()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let app = routes().with_state(AppState::for_tests());
        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Route /nope not found");
    }
}
