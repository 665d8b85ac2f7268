//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;

use agape_storefront::config::database_url_from_env;
use agape_storefront::db;

/// Load `.env` and connect to the storefront database.
async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
