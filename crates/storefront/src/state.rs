//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{CatalogCache, PaystackClient, PaystackError, TokenSigner};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    cache: CatalogCache,
    paystack: PaystackClient,
    signer: TokenSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Paystack HTTP client can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaystackError> {
        let paystack = PaystackClient::new(&config.paystack)?;
        let signer = TokenSigner::new(config.token_secret.clone(), config.base_url.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache: CatalogCache::new(),
                paystack,
                signer,
            }),
        })
    }

    /// State over a lazily connected pool, for handler tests that never
    /// reach the database.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is invalid.
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub(crate) fn for_tests() -> Self {
        let pool = PgPool::connect_lazy("postgres://localhost/agape_test").unwrap();
        Self::new(StorefrontConfig::for_tests(), pool).unwrap()
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Get a reference to the Paystack API client.
    #[must_use]
    pub fn paystack(&self) -> &PaystackClient {
        &self.inner.paystack
    }

    /// Access token signer.
    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.inner.signer
    }
}
