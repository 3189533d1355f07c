//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use lumina_api::config::ApiConfig;
use sqlx::PgPool;

/// Connect with the API's own configuration so both read the same variables.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(lumina_api::db::create_pool(&config.database_url, 2).await?)
}
