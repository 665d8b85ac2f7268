//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`,
//! rendered as `{"status": "error", "message": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{
    AuthError, CatalogError, CheckoutError, CouponError, PaymentError, PaystackError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Paystack API operation failed.
    #[error("Paystack error: {0}")]
    Paystack(#[from] PaystackError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";
const GATEWAY_MESSAGE: &str = "Payment service error";

impl AppError {
    /// HTTP status and client-facing message.
    ///
    /// Internal details never reach the client.
    #[must_use]
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Internal(_) => internal(),
            Self::Auth(err) => auth_status(err),
            Self::Coupon(err) => coupon_status(err),
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CatalogError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CatalogError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                CatalogError::Repository(inner) => repository_status(inner),
            },
            Self::Checkout(err) => match err {
                CheckoutError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CheckoutError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CheckoutError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                CheckoutError::Coupon(inner) => coupon_status(inner),
                CheckoutError::Repository(inner) => repository_status(inner),
            },
            Self::Payment(err) => match err {
                PaymentError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                PaymentError::Gateway(inner) => paystack_status(inner),
                PaymentError::Repository(inner) => repository_status(inner),
            },
            Self::Paystack(err) => paystack_status(err),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (
            status,
            Json(json!({
                "status": "error",
                "message": message,
            })),
        )
            .into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        }
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        ),
        AuthError::WeakPassword(msg) | AuthError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired".to_string()),
        AuthError::MissingRefreshToken => (
            StatusCode::UNAUTHORIZED,
            "Refresh token required".to_string(),
        ),
        AuthError::InvalidRefreshToken => (
            StatusCode::UNAUTHORIZED,
            "Invalid or expired refresh token".to_string(),
        ),
        AuthError::SessionNotFound => (StatusCode::NOT_FOUND, "Session not found".to_string()),
        AuthError::Repository(inner) => repository_status(inner),
        AuthError::PasswordHash => internal(),
    }
}

fn coupon_status(err: &CouponError) -> (StatusCode, String) {
    match err {
        CouponError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        CouponError::DuplicateCode => (StatusCode::CONFLICT, err.to_string()),
        CouponError::Repository(inner) => repository_status(inner),
        CouponError::Inactive
        | CouponError::Expired
        | CouponError::MinimumNotMet(_)
        | CouponError::UsageLimitReached
        | CouponError::UserLimitReached
        | CouponError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn paystack_status(err: &PaystackError) -> (StatusCode, String) {
    match err {
        PaystackError::InvalidSignature => {
            (StatusCode::UNAUTHORIZED, "Invalid signature".to_string())
        }
        PaystackError::Api { status, message } if *status == 400 || *status == 404 => {
            (StatusCode::BAD_REQUEST, message.clone())
        }
        PaystackError::Http(_) | PaystackError::Api { .. } | PaystackError::Parse(_) => {
            (StatusCode::BAD_GATEWAY, GATEWAY_MESSAGE.to_string())
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for payment and order events.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_status() {
        assert_eq!(
            get_status(RepositoryError::Conflict("SKU already exists".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CouponError::Expired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CouponError::MinimumNotMet(Decimal::from(100)).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::Coupon(CouponError::NotFound).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::TokenExpired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(PaystackError::InvalidSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(PaymentError::Gateway(PaystackError::Parse("bad".into())).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let (_, message) =
            AppError::Internal("connection refused at 10.0.0.3".into()).status_and_message();
        assert_eq!(message, INTERNAL_MESSAGE);

        let (_, message) = AppError::Database(RepositoryError::DataCorruption("bad enum".into()))
            .status_and_message();
        assert_eq!(message, INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = AppError::BadRequest("Name is required".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Name is required");
    }
}
