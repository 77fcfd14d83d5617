//! Subcommand implementations.

pub mod migrate;
pub mod product;
pub mod seed;

use apothecary_storefront::config::database_url_from_env;
use apothecary_storefront::db::{self, PgStore};

/// Connect to the storefront database named by the environment.
async fn connect() -> Result<PgStore, Box<dyn std::error::Error>> {
    let database_url = database_url_from_env()?;
    let pool = db::create_pool(&database_url).await?;
    tracing::info!("Connected to database");
    Ok(PgStore::new(pool))
}
