//! Authentication API handlers.
//!
//! The access token is returned in the response body; the refresh token only
//! ever travels in an http-only cookie scoped to `/api/v1/auth`.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE, USER_AGENT},
        request::Parts,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use agape_core::SessionId;

use super::response::ApiResponse;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::middleware::rate_limit::client_ip_from_parts;
use crate::services::AuthService;
use crate::services::auth::{ClientInfo, REFRESH_TOKEN_TTL, Registration};
use crate::state::AppState;

/// Name of the refresh token cookie.
pub const REFRESH_COOKIE: &str = "agape_refresh";

const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Routes that issue credentials. These sit behind the strict rate limiter.
pub fn credential_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

/// Authenticated account routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", patch(update_profile))
        .route("/change-password", post(change_password))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", delete(revoke_session))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Optional body for refresh/logout from clients that can't send cookies.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// =============================================================================
// Extractors & Cookie Helpers
// =============================================================================

/// Caller IP and user agent, recorded on new sessions.
pub struct Client(pub ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self(ClientInfo {
            ip: client_ip_from_parts(&parts.headers, &parts.extensions).map(|ip| ip.to_string()),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|ua| ua.chars().take(512).collect()),
        }))
    }
}

/// The refresh token from the cookie, falling back to the request body.
fn refresh_token_from(headers: &HeaderMap, body: Option<&RefreshRequest>) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(std::result::Result::ok)
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.value().to_owned())
        .or_else(|| body.and_then(|b| b.refresh_token.clone()))
}

fn refresh_cookie(value: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(cookie::time::Duration::seconds(REFRESH_TOKEN_TTL.num_seconds()))
        .build()
}

fn expired_refresh_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = refresh_cookie("", secure);
    cookie.make_removal();
    cookie
}

fn with_cookie(mut response: Response, cookie: &Cookie<'_>) -> Response {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and log in.
///
/// # Errors
///
/// Returns 400 for invalid input and 409 if the email is taken.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<RegisterRequest>,
) -> Result<Response> {
    let service = AuthService::new(state.pool(), state.signer());
    let result = service
        .register(
            &Registration {
                email: &body.email,
                password: &body.password,
                name: &body.name,
                phone: body.phone.as_deref(),
            },
            &client,
        )
        .await?;

    let cookie = refresh_cookie(&result.refresh_token, state.config().is_secure());
    let response = ApiResponse::created(&result)
        .message("User registered successfully")
        .into_response();
    Ok(with_cookie(response, &cookie))
}

/// # Errors
///
/// Returns 401 for a wrong email or password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let service = AuthService::new(state.pool(), state.signer());
    let result = service.login(&body.email, &body.password, &client).await?;

    let cookie = refresh_cookie(&result.refresh_token, state.config().is_secure());
    let response = ApiResponse::ok(&result)
        .message("Login successful")
        .into_response();
    Ok(with_cookie(response, &cookie))
}

/// Exchange the refresh token for a new access token.
///
/// # Errors
///
/// Returns 401 if the refresh token is missing, revoked, or expired.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse> {
    let token = refresh_token_from(&headers, body.as_ref().map(|Json(b)| b));
    let service = AuthService::new(state.pool(), state.signer());
    let (user, token) = service.refresh(token.as_deref()).await?;

    Ok(ApiResponse::ok(json!({
        "user": user,
        "accessToken": token.access_token,
        "tokenType": token.token_type,
        "expiresIn": token.expires_in,
    })))
}

/// Revoke the current session and clear the cookie.
///
/// # Errors
///
/// Returns 500 if the session can't be revoked.
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response> {
    let token = refresh_token_from(&headers, body.as_ref().map(|Json(b)| b));
    AuthService::new(state.pool(), state.signer())
        .logout(token.as_deref())
        .await?;
    tracing::info!(user_id = %user.id, "User logged out");

    let response = ApiResponse::ok(json!(null))
        .message("Logged out successfully")
        .into_response();
    Ok(with_cookie(
        response,
        &expired_refresh_cookie(state.config().is_secure()),
    ))
}

/// # Errors
///
/// Returns 404 if the account no longer exists.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let profile = AuthService::new(state.pool(), state.signer())
        .profile(user.id)
        .await?;
    Ok(ApiResponse::ok(profile))
}

/// # Errors
///
/// Returns 400 if neither field is given.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ProfileRequest>,
) -> Result<impl IntoResponse> {
    let updated = AuthService::new(state.pool(), state.signer())
        .update_profile(user.id, body.name.as_deref(), body.phone.as_deref())
        .await?;
    Ok(ApiResponse::ok(updated).message("Profile updated successfully"))
}

/// Change password and sign out every other session.
///
/// # Errors
///
/// Returns 401 if the current password is wrong and 400 if the new one is
/// too weak.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    let current = refresh_token_from(&headers, None);
    let revoked = AuthService::new(state.pool(), state.signer())
        .change_password(
            user.id,
            &body.current_password,
            &body.new_password,
            current.as_deref(),
        )
        .await?;

    Ok(ApiResponse::ok(json!({ "revokedSessions": revoked }))
        .message("Password changed successfully"))
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_sessions(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let sessions = AuthService::new(state.pool(), state.signer())
        .sessions(user.id)
        .await?;
    Ok(ApiResponse::ok(sessions))
}

/// # Errors
///
/// Returns 404 if the session isn't one of the caller's.
pub async fn revoke_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id: SessionId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid session id".to_string()))?;
    AuthService::new(state.pool(), state.signer())
        .revoke_session(user.id, id)
        .await?;
    Ok(ApiResponse::ok(json!(null)).message("Session revoked"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("tok", true).to_string();
        assert!(cookie.starts_with("agape_refresh=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/api/v1/auth"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = expired_refresh_cookie(false).to_string();
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_refresh_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; agape_refresh=from-cookie"),
        );
        let body = RefreshRequest {
            refresh_token: Some("from-body".to_string()),
        };
        assert_eq!(
            refresh_token_from(&headers, Some(&body)).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(
            refresh_token_from(&HeaderMap::new(), Some(&body)).as_deref(),
            Some("from-body")
        );
        assert_eq!(refresh_token_from(&HeaderMap::new(), None), None);
    }
}
