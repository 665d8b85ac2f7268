//! Product API handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use agape_core::ProductId;

use super::response::ApiResponse;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::product::{NewProduct, ProductFilter, ProductListQuery, ProductPatch};
use crate::services::CatalogService;
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/search", get(search))
        .route("/{id_or_slug}", get(show).patch(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub(crate) fn parse_product_id(raw: &str) -> Result<ProductId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid product id".to_string()))
}

/// List active products with filters, sorting, and pagination.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse> {
    let filter = ProductFilter::from(query);
    let page = CatalogService::new(state.pool(), state.cache())
        .list_products(&filter)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// # Errors
///
/// Returns 400 when `q` is missing or blank.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let page = CatalogService::new(state.pool(), state.cache())
        .search(query.q.as_deref().unwrap_or_default(), query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// A product by id or slug. Admins also see inactive products.
///
/// # Errors
///
/// Returns 404 if no visible product matches.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id_or_slug): Path<String>,
) -> Result<impl IntoResponse> {
    let include_inactive = user.as_ref().is_some_and(|u| u.is_admin());
    let product = CatalogService::new(state.pool(), state.cache())
        .product(&id_or_slug, include_inactive)
        .await?;
    Ok(ApiResponse::ok(product))
}

/// # Errors
///
/// Returns 400 for invalid input and 409 for a duplicate SKU or slug.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<impl IntoResponse> {
    let product = CatalogService::new(state.pool(), state.cache())
        .create_product(&body, admin.id)
        .await?;
    Ok(ApiResponse::created(product).message("Product created successfully"))
}

/// # Errors
///
/// Returns 400 for an empty or invalid patch and 404 for an unknown product.
#[instrument(skip(state, admin, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    Json(body): Json<ProductPatch>,
) -> Result<impl IntoResponse> {
    let id = parse_product_id(&id)?;
    let product = CatalogService::new(state.pool(), state.cache())
        .update_product(id, &body, admin.id)
        .await?;
    Ok(ApiResponse::ok(product).message("Product updated successfully"))
}

/// Soft-delete a product.
///
/// # Errors
///
/// Returns 404 for an unknown or already inactive product.
#[instrument(skip(state, admin))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_product_id(&id)?;
    CatalogService::new(state.pool(), state.cache())
        .delete_product(id, admin.id)
        .await?;
    Ok(ApiResponse::ok(json!({ "id": id })).message("Product deleted successfully"))
}
