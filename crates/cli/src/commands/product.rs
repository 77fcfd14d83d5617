//! Catalog maintenance commands.

use std::time::Duration;

use tracing::{info, warn};

use apothecary_core::ProductId;
use apothecary_storefront::services::{CatalogCache, CatalogService, CommerceError};

/// Delete a product, or report which orders still need it.
///
/// # Errors
///
/// Returns an error if the id is malformed, the product does not exist, or
/// active orders still reference it.
pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: ProductId = id.parse()?;

    let store = super::connect().await?;
    let cache = CatalogCache::new(Duration::ZERO);
    let catalog = CatalogService::new(&store, &cache);

    match catalog.delete_product(id).await {
        Ok(images) => {
            info!(product_id = %id, "Product deleted");
            for image in &images {
                info!("  Image no longer referenced: {image}");
            }
            Ok(())
        }
        Err(CommerceError::Conflict {
            message,
            blocking_statuses,
        }) => {
            warn!(product_id = %id, "Product is still on active orders");
            for status in &blocking_statuses {
                warn!("  - order in status {status}");
            }
            Err(message.into())
        }
        Err(e) => Err(e.into()),
    }
}
