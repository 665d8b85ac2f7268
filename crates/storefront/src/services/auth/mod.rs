//! Authentication service.
//!
//! Password accounts with short-lived signed access tokens and server-side
//! refresh sessions.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{
    ACCESS_TOKEN_TTL, AccessToken, Claims, REFRESH_TOKEN_TTL, TokenSigner,
    generate_refresh_token, hash_refresh_token,
};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use agape_core::{Email, SessionId, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::sessions::SessionRepository;
use crate::db::users::UserRepository;
use crate::models::user::{CurrentUser, Profile, Session, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted password; argon2 input beyond this is pointless work.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Where a login came from, stored on the session.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct Registration<'r> {
    pub email: &'r str,
    pub password: &'r str,
    pub name: &'r str,
    pub phone: Option<&'r str>,
}

/// Result of a successful register or login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user: User,
    #[serde(flatten)]
    pub token: AccessToken,
    /// Sent to the client only as an http-only cookie.
    #[serde(skip)]
    pub refresh_token: String,
}

/// Authentication service.
///
/// Handles registration, login, token refresh, and session management.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    sessions: SessionRepository<'a>,
    signer: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, signer: &'a TokenSigner) -> Self {
        Self {
            users: UserRepository::new(pool),
            sessions: SessionRepository::new(pool),
            signer,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        input: &Registration<'_>,
        client: &ClientInfo,
    ) -> Result<LoginResult, AuthError> {
        let email = Email::parse(input.email)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("Name is required".to_string()));
        }
        validate_password(input.password)?;

        let password_hash = hash_password(input.password)?;
        let phone = input.phone.map(str::trim).filter(|p| !p.is_empty());

        let user = self
            .users
            .create(&email, name, phone, UserRole::Customer, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.start_session(user, client).await
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginResult, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        tracing::info!(user_id = %user.id, "User logged in");
        self.start_session(user, client).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingRefreshToken` if no token was presented.
    /// Returns `AuthError::InvalidRefreshToken` if it is unknown, revoked, or expired.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<(User, AccessToken), AuthError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        let session = self
            .sessions
            .find_active(&hash_refresh_token(token))
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let user = self
            .users
            .get_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let access = self.signer.issue(&CurrentUser::from(&user))?;
        Ok((user, access))
    }

    /// Revoke the session behind a refresh token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            self.sessions
                .revoke_by_hash(&hash_refresh_token(token))
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// The user with their order and wishlist counts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn profile(&self, user_id: UserId) -> Result<Profile, AuthError> {
        let user = self.get_user(user_id).await?;
        let (order_count, wishlist_count) = self.users.activity_counts(user_id).await?;

        Ok(Profile {
            user,
            order_count,
            wishlist_count,
        })
    }

    /// Update name and/or phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` if neither field is given or the name is blank.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, AuthError> {
        if name.is_none() && phone.is_none() {
            return Err(AuthError::InvalidInput("No fields to update".to_string()));
        }
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(AuthError::InvalidInput("Name cannot be empty".to_string()));
        }

        self.users
            .update_profile(user_id, name, phone.map(str::trim))
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change password after checking the current one. Every session except
    /// the caller's (identified by its refresh token) is revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is wrong.
    /// Returns `AuthError::WeakPassword` if the new password doesn't meet requirements.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        refresh_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        let current_hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;
        verify_password(current_password, &current_hash)?;
        validate_password(new_password)?;

        let new_hash = hash_password(new_password)?;
        self.users.update_password(user_id, &new_hash).await?;

        let keep = match refresh_token {
            Some(token) => self
                .sessions
                .find_active(&hash_refresh_token(token))
                .await?
                .filter(|s| s.user_id == user_id)
                .map(|s| s.id),
            None => None,
        };
        let revoked = self.sessions.revoke_all_except(user_id, keep).await?;

        tracing::info!(user_id = %user_id, revoked, "Password changed");
        Ok(revoked)
    }

    /// The user's live sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        Ok(self.sessions.list_active(user_id).await?)
    }

    /// Revoke one of the user's sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionNotFound` if it isn't a live session of this user.
    pub async fn revoke_session(&self, user_id: UserId, id: SessionId) -> Result<(), AuthError> {
        if self.sessions.revoke(user_id, id).await? {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn start_session(&self, user: User, client: &ClientInfo) -> Result<LoginResult, AuthError> {
        let refresh_token = generate_refresh_token();
        self.sessions
            .create(
                user.id,
                &hash_refresh_token(&refresh_token),
                client.ip.as_deref(),
                client.user_agent.as_deref(),
                Utc::now() + REFRESH_TOKEN_TTL,
            )
            .await?;

        let token = self.signer.issue(&CurrentUser::from(&user))?;
        Ok(LoginResult {
            user,
            token,
            refresh_token,
        })
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_rules() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
