//! Authentication extractors.
//!
//! Access tokens arrive as `Authorization: Bearer <token>` and are verified
//! with the shared [`TokenSigner`](crate::services::TokenSigner). No database
//! lookup happens here; the token carries id, email, and role.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::user::CurrentUser;
use crate::services::AuthError;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let state = AppState::from_ref(state);
        let user: CurrentUser = state.signer().verify(token).map_err(|e| match e {
            AuthError::TokenExpired => AppError::Auth(e),
            _ => AppError::Auth(AuthError::InvalidToken),
        })?.into();

        set_sentry_user(&user.id, Some(&user.email));
        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated administrator.
///
/// Missing or bad tokens get 401; valid customer tokens get 403.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request when the token is
/// missing or invalid.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user = bearer_token(parts)
            .and_then(|token| state.signer().verify(token).ok())
            .map(CurrentUser::from);

        Ok(Self(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use agape_core::{UserId, UserRole};

    use super::*;

    async fn whoami(RequireAuth(user): RequireAuth) -> String {
        user.email
    }

    async fn admin_only(RequireAdmin(user): RequireAdmin) -> String {
        user.id.to_string()
    }

    async fn maybe(OptionalAuth(user): OptionalAuth) -> String {
        user.map_or_else(|| "guest".to_string(), |u| u.email)
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route("/admin", get(admin_only))
            .route("/maybe", get(maybe))
            .with_state(state)
    }

    fn token(state: &AppState, role: UserRole) -> String {
        let user = CurrentUser {
            id: UserId::new(9),
            email: "kofi@example.com".to_string(),
            role,
        };
        state.signer().issue(&user).unwrap().access_token
    }

    async fn call(state: AppState, path: &str, bearer: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(path);
        if let Some(bearer) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {bearer}"));
        }
        let response = app(state)
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (status, _) = call(AppState::for_tests(), "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        let state = AppState::for_tests();
        let bearer = token(&state, UserRole::Customer);
        let (status, body) = call(state, "/me", Some(&bearer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "kofi@example.com");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let (status, _) = call(AppState::for_tests(), "/me", Some("not.a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_forbidden_from_admin_route() {
        let state = AppState::for_tests();
        let bearer = token(&state, UserRole::Customer);
        let (status, _) = call(state, "/admin", Some(&bearer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_allowed() {
        let state = AppState::for_tests();
        let bearer = token(&state, UserRole::Admin);
        let (status, body) = call(state, "/admin", Some(&bearer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "9");
    }

    #[tokio::test]
    async fn test_optional_auth_falls_back_to_guest() {
        let state = AppState::for_tests();
        let (_, body) = call(state.clone(), "/maybe", Some("bogus")).await;
        assert_eq!(body, "guest");

        let bearer = token(&state, UserRole::Customer);
        let (_, body) = call(state, "/maybe", Some(&bearer)).await;
        assert_eq!(body, "kofi@example.com");
    }
}
