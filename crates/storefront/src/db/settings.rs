//! Store settings repository.

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::setting::{
    DEFAULT_DELIVERY_FEE, DEFAULT_FREE_SHIPPING_THRESHOLD, DELIVERY_FEE, FREE_SHIPPING_THRESHOLD,
    Setting, ShippingRates, amount_of,
};

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_all(&self) -> Result<Vec<Setting>, RepositoryError> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, description, updated_at FROM agape.setting ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<Setting>, RepositoryError> {
        let setting = sqlx::query_as::<_, Setting>(
            "SELECT key, value, description, updated_at FROM agape.setting WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        Ok(setting)
    }

    /// Insert or replace a setting value. The description is kept unless a
    /// new one is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        key: &str,
        value: &Value,
        description: Option<&str>,
    ) -> Result<Setting, RepositoryError> {
        let setting = sqlx::query_as::<_, Setting>(
            "INSERT INTO agape.setting (key, value, description)
             VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE
             SET value = EXCLUDED.value,
                 description = COALESCE(EXCLUDED.description, agape.setting.description),
                 updated_at = NOW()
             RETURNING key, value, description, updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .fetch_one(self.pool)
        .await?;

        Ok(setting)
    }

    /// Flat delivery fee, 50 when unset or malformed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivery_fee(&self) -> Result<Decimal, RepositoryError> {
        self.amount(DELIVERY_FEE, DEFAULT_DELIVERY_FEE).await
    }

    /// Subtotal above which delivery is free, 500 when unset or malformed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn free_shipping_threshold(&self) -> Result<Decimal, RepositoryError> {
        self.amount(FREE_SHIPPING_THRESHOLD, DEFAULT_FREE_SHIPPING_THRESHOLD)
            .await
    }

    /// Delivery fee and free-shipping threshold together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipping_rates(&self) -> Result<ShippingRates, RepositoryError> {
        Ok(ShippingRates {
            delivery_fee: self.delivery_fee().await?,
            free_shipping_threshold: self.free_shipping_threshold().await?,
        })
    }

    async fn amount(&self, key: &str, default: Decimal) -> Result<Decimal, RepositoryError> {
        let value = self.get(key).await?;
        Ok(value
            .as_ref()
            .and_then(|s| amount_of(&s.value))
            .unwrap_or(default))
    }
}
