//! Wishlist API handlers. All routes require a signed-in customer.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;
use serde_json::json;

use agape_core::{ProductId, VariantId};

use super::products::parse_product_id;
use super::response::ApiResponse;
use crate::db::{RepositoryError, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the wishlist router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(add).delete(clear))
        .route("/{product_id}", delete(remove))
        .route("/check/{product_id}", get(check))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub variant_id: Option<VariantId>,
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let items = WishlistRepository::new(state.pool()).list(user.id).await?;
    Ok(ApiResponse::ok(json!({ "count": items.len(), "items": items })))
}

/// # Errors
///
/// Returns 404 for an unknown product or variant and 409 if already saved.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddRequest>,
) -> Result<impl IntoResponse> {
    let id = WishlistRepository::new(state.pool())
        .add(user.id, body.product_id, body.variant_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
            other => other.into(),
        })?;
    Ok(ApiResponse::created(json!({
        "id": id,
        "productId": body.product_id,
        "variantId": body.variant_id,
    }))
    .message("Added to wishlist"))
}

/// # Errors
///
/// Returns 404 if the product isn't in the wishlist.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse> {
    let product_id = parse_product_id(&product_id)?;
    WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::NotFound("Product not found in wishlist".to_string())
            }
            other => other.into(),
        })?;
    Ok(ApiResponse::ok(json!({ "productId": product_id })).message("Removed from wishlist"))
}

/// # Errors
///
/// Returns 500 if the delete fails.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let removed = WishlistRepository::new(state.pool()).clear(user.id).await?;
    Ok(ApiResponse::ok(json!({ "removed": removed })).message("Wishlist cleared"))
}

/// Whether a product (or one variant of it) is saved.
///
/// # Errors
///
/// Returns 400 for a malformed product id.
pub async fn check(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<String>,
    Query(query): Query<CheckQuery>,
) -> Result<impl IntoResponse> {
    let product_id = parse_product_id(&product_id)?;
    let saved = WishlistRepository::new(state.pool())
        .contains(user.id, product_id, query.variant_id)
        .await?;
    Ok(ApiResponse::ok(json!({
        "productId": product_id,
        "inWishlist": saved,
    })))
}
