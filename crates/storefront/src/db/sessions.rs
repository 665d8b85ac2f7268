//! Login session (refresh token) repository.
//!
//! Only the SHA-256 digest of a refresh token is stored.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use agape_core::{SessionId, UserId};

use super::RepositoryError;
use crate::models::user::Session;

/// A live session matched by its token digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveSession {
    pub id: SessionId,
    pub user_id: UserId,
}

pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionId, RepositoryError> {
        let id = sqlx::query_scalar::<_, SessionId>(
            "INSERT INTO agape.refresh_token (user_id, token_hash, ip, user_agent, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(ip)
        .bind(user_agent)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Find an unrevoked, unexpired session by token digest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        token_hash: &str,
    ) -> Result<Option<ActiveSession>, RepositoryError> {
        let session = sqlx::query_as::<_, ActiveSession>(
            "SELECT id, user_id FROM agape.refresh_token
             WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    /// Revoke the session holding this token digest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agape.refresh_token SET revoked_at = NOW()
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke one of a user's sessions.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live session was revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke(&self, user_id: UserId, id: SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agape.refresh_token SET revoked_at = NOW()
             WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every session of a user except `keep` (if given).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke_all_except(
        &self,
        user_id: UserId,
        keep: Option<SessionId>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agape.refresh_token SET revoked_at = NOW()
             WHERE user_id = $1 AND revoked_at IS NULL
               AND ($2::INTEGER IS NULL OR id <> $2)",
        )
        .bind(user_id)
        .bind(keep)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// List a user's live sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, user_id: UserId) -> Result<Vec<Session>, RepositoryError> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT id, ip, user_agent, created_at, expires_at
             FROM agape.refresh_token
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(sessions)
    }
}
