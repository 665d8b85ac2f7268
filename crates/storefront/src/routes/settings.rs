//! Store settings API handlers.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::response::ApiResponse;
use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::setting::{DELIVERY_FEE, FREE_SHIPPING_THRESHOLD, Setting, amount_of};
use crate::state::AppState;

const MAX_KEY_LEN: usize = 64;

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{key}", put(update))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub value: Value,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingValue {
    pub value: Value,
    pub description: Option<String>,
}

fn settings_map(settings: Vec<Setting>) -> BTreeMap<String, SettingValue> {
    settings
        .into_iter()
        .map(|s| {
            (
                s.key,
                SettingValue {
                    value: s.value,
                    description: s.description,
                },
            )
        })
        .collect()
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid setting key".to_string()))
    }
}

/// Shipping settings must carry a non-negative `amount`.
fn validate_value(key: &str, value: &Value) -> Result<()> {
    if value.is_null() {
        return Err(AppError::BadRequest("Value is required".to_string()));
    }
    if matches!(key, DELIVERY_FEE | FREE_SHIPPING_THRESHOLD)
        && amount_of(value).is_none()
    {
        return Err(AppError::BadRequest(format!(
            "{key} needs a non-negative amount"
        )));
    }
    Ok(())
}

/// All settings as `key -> {value, description}`.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let settings = SettingsRepository::new(state.pool()).get_all().await?;
    Ok(ApiResponse::ok(settings_map(settings)))
}

/// Create or replace a setting.
///
/// # Errors
///
/// Returns 400 for a malformed key, a missing/null value, or a shipping
/// setting without a non-negative amount.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(key): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> Result<impl IntoResponse> {
    validate_key(&key)?;
    validate_value(&key, &body.value)?;

    let setting = SettingsRepository::new(state.pool())
        .upsert(&key, &body.value, body.description.as_deref())
        .await?;
    tracing::info!(admin_id = %admin.id, key = %key, "Setting updated");
    Ok(ApiResponse::ok(setting).message("Setting updated successfully"))
}
