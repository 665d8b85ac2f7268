//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! agape migrate
//! ```
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded into
//! the storefront library at build time.

use agape_storefront::db;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    pool.close().await;
    Ok(())
}
