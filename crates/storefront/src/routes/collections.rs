//! Collection API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use agape_core::CollectionId;

use super::response::ApiResponse;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::collection::{CollectionPatch, NewCollection};
use crate::services::CatalogService;
use crate::state::AppState;

/// Build the collections router.
///
/// `GET /{key}` takes a slug; `PUT`/`DELETE /{key}` take a numeric id.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create).delete(destroy_all))
        .route("/{key}", get(show).put(update).delete(destroy))
}

fn parse_collection_id(raw: &str) -> Result<CollectionId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid collection id".to_string()))
}

/// All collections with product counts.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let collections = CatalogService::new(state.pool(), state.cache())
        .collections()
        .await?;
    Ok(ApiResponse::ok(collections))
}

/// # Errors
///
/// Returns 404 if no collection has this slug.
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let collection = CatalogService::new(state.pool(), state.cache())
        .collection(&slug)
        .await?;
    Ok(ApiResponse::ok(collection))
}

/// # Errors
///
/// Returns 400 for a blank name and 409 for a taken slug.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<NewCollection>,
) -> Result<impl IntoResponse> {
    let collection = CatalogService::new(state.pool(), state.cache())
        .create_collection(&body)
        .await?;
    Ok(ApiResponse::created(collection).message("Collection created successfully"))
}

/// # Errors
///
/// Returns 400 for an empty patch and 404 for an unknown collection.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Json(body): Json<CollectionPatch>,
) -> Result<impl IntoResponse> {
    let id = parse_collection_id(&id)?;
    let collection = CatalogService::new(state.pool(), state.cache())
        .update_collection(id, &body)
        .await?;
    Ok(ApiResponse::ok(collection).message("Collection updated successfully"))
}

/// # Errors
///
/// Returns 404 for an unknown collection.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_collection_id(&id)?;
    CatalogService::new(state.pool(), state.cache())
        .delete_collection(id)
        .await?;
    Ok(ApiResponse::ok(json!({ "id": id })).message("Collection deleted successfully"))
}

/// # Errors
///
/// Returns 500 if the delete fails.
pub async fn destroy_all(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let deleted = CatalogService::new(state.pool(), state.cache())
        .delete_all_collections()
        .await?;
    tracing::warn!(admin_id = %admin.id, deleted, "Collections wiped");
    Ok(ApiResponse::ok(json!({ "deleted": deleted })).message("All collections deleted"))
}
