//! Access and refresh tokens.
//!
//! Access tokens are `base64url(claims).base64url(hmac_sha256(claims))`, short
//! lived and verified without a database round trip. Refresh tokens are random
//! and only their SHA-256 digest is stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use agape_core::{UserId, UserRole};

use super::AuthError;
use crate::models::user::CurrentUser;

type HmacSha256 = Hmac<Sha256>;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

/// Refresh token (session) lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

const REFRESH_TOKEN_BYTES: usize = 32;

/// Signed access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// A freshly issued access token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// Issues and verifies access tokens with a shared secret.
pub struct TokenSigner {
    secret: SecretString,
    issuer: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString, issuer: impl Into<String>) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
        }
    }

    /// Issue an access token for a user, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the claims cannot be encoded.
    pub fn issue(&self, user: &CurrentUser) -> Result<AccessToken, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Issue an access token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the claims cannot be encoded.
    pub fn issue_at(&self, user: &CurrentUser, now: i64) -> Result<AccessToken, AuthError> {
        let ttl = ACCESS_TOKEN_TTL.num_seconds();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + ttl,
            iss: self.issuer.clone(),
        };

        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(encoded.as_bytes())?);

        Ok(AccessToken {
            access_token: format!("{encoded}.{signature}"),
            token_type: "Bearer",
            expires_in: ttl,
        })
    }

    /// Verify a token's signature, issuer, and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed or tampered tokens and
    /// `AuthError::TokenExpired` for expired ones.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`TokenSigner::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let (encoded, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        self.mac()?
            .chain_update(encoded.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

        if claims.iss != self.issuer {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp <= now {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, AuthError> {
        Ok(self
            .mac()?
            .chain_update(data)
            .finalize()
            .into_bytes()
            .to_vec())
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Generate a new opaque refresh token.
#[must_use]
pub fn generate_refresh_token() -> String {
    let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest stored in place of a refresh token.
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
