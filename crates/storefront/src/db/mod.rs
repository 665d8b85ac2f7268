//! Database operations for the storefront `PostgreSQL` database.
//!
//! # Schema: `agape`
//!
//! ## Tables
//!
//! - `user` - Customers and administrators
//! - `refresh_token` - Login sessions (hashed refresh tokens)
//! - `collection`, `product`, `product_variant`, `product_image` - Catalog
//! - `audit_log` - Admin catalog changes
//! - `coupon`, `coupon_usage` - Discount codes and redemptions
//! - `customer_order`, `order_item` - Orders
//! - `payment` - Paystack transactions
//! - `wishlist_item` - Saved products
//! - `setting` - Store-wide key/value settings
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p agape-cli -- migrate
//! ```

pub mod audit;
pub mod collections;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod products;
pub mod sessions;
pub mod settings;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use audit::AuditRepository;
pub use collections::CollectionRepository;
pub use coupons::CouponRepository;
pub use dashboard::DashboardRepository;
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use products::ProductRepository;
pub use sessions::SessionRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict` with the given message.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded storefront migrations.
///
/// # Errors
///
/// Returns `MigrateError` if any migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
