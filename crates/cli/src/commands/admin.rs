//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user with a password
//! agape admin create -e admin@agapelooks.com -n "Admin Name" -p "long passphrase"
//!
//! # Promote an existing customer account
//! agape admin promote -e customer@example.com
//! ```

use agape_core::{Email, UserId, UserRole};
use agape_storefront::db::{RepositoryError, UserRepository};
use agape_storefront::services::AuthError;
use agape_storefront::services::auth::{hash_password, validate_password};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(String),

    /// Repository error.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password rejected or couldn't be hashed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// No user with this email.
    #[error("No user found with email: {0}")]
    UserNotFound(String),
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError` for an invalid email, weak password, duplicate
/// account, or database failure.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let name = name.trim();
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let pool = super::connect()
        .await
        .map_err(|e| AdminError::Connect(e.to_string()))?;

    tracing::info!("Creating admin user: {}", email);

    let user = UserRepository::new(&pool)
        .create(&email, name, None, UserRole::Admin, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    pool.close().await;
    Ok(user.id)
}

/// Give an existing user the admin role.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account has this email.
pub async fn promote(email: &str) -> Result<UserId, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = super::connect()
        .await
        .map_err(|e| AdminError::Connect(e.to_string()))?;

    let user = UserRepository::new(&pool)
        .set_role(&email, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!("Promoted {} (ID {}) to admin", user.email, user.id);
    tracing::warn!("Existing access tokens keep the old role until they expire");

    pool.close().await;
    Ok(user.id)
}
