//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] agape_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Request body failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// Access token is malformed, tampered with, or from another issuer.
    #[error("invalid access token")]
    InvalidToken,

    /// Access token is past its expiry.
    #[error("access token expired")]
    TokenExpired,

    /// No refresh token in the cookie or body.
    #[error("refresh token missing")]
    MissingRefreshToken,

    /// Refresh token unknown, revoked, or expired.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Session does not exist or belongs to another user.
    #[error("session not found")]
    SessionNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
