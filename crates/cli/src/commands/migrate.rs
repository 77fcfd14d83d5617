//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! apo-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/`. The
//! `tower_sessions` schema is created by the session store itself.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use apothecary_storefront::config::ConfigError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration
/// fails.
pub async fn storefront() -> Result<(), MigrationError> {
    let database_url = apothecary_storefront::config::database_url_from_env()?;

    info!("Connecting to storefront database...");
    let pool = apothecary_storefront::db::create_pool(&database_url).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    info!("Storefront migrations complete!");
    Ok(())
}
