//! Audit log for admin catalog changes.

use serde_json::Value;
use sqlx::PgExecutor;

use agape_core::UserId;

use super::RepositoryError;

/// Audit log writes. Takes any executor so rows can join the caller's
/// transaction.
pub struct AuditRepository;

impl AuditRepository {
    /// Record an admin action.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record<'e>(
        executor: impl PgExecutor<'e>,
        actor: UserId,
        action: &str,
        entity: &str,
        entity_id: i32,
        changes: &Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agape.audit_log (actor_id, action, entity, entity_id, changes)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(actor)
        .bind(action)
        .bind(entity)
        .bind(entity_id)
        .bind(changes)
        .execute(executor)
        .await?;

        Ok(())
    }
}
