//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! lumina migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time. The API never migrates on startup.

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the connection fails or a migration fails to apply.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
