//! Seed the catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - name: DANIQUE D3 60K
//!     category: Vitamin D3
//!     description: Essential bone health supplement.
//!     price: "12.50"
//!     stock: 200
//!     images: ["https://placehold.co/600x400?text=DANIQUE+D3"]
//! ```
//!
//! Products whose name already exists in the catalog are skipped, so the
//! command can be re-run safely.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use apothecary_storefront::models::{ProductFilter, ProductRequest};
use apothecary_storefront::services::{CatalogCache, CatalogService};

/// Top-level structure of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<ProductRequest>,
}

/// Create every product in `file_path` that is not already in the catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry fails
/// validation, or database operations fail.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let mut drafts = Vec::with_capacity(seed.products.len());
    let mut errors = Vec::new();
    for (index, request) in seed.products.into_iter().enumerate() {
        match request.validate() {
            Ok(draft) => drafts.push(draft),
            Err(e) => errors.push(format!("entry {}: {e}", index + 1)),
        }
    }
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    info!(products = drafts.len(), "Seed file validated");

    let store = super::connect().await?;
    let cache = CatalogCache::new(Duration::ZERO);
    let catalog = CatalogService::new(&store, &cache);

    let existing: HashSet<String> = catalog
        .list_products(ProductFilter::default())
        .await?
        .into_iter()
        .map(|p| p.name.to_lowercase())
        .collect();

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for draft in drafts {
        if existing.contains(&draft.name.to_lowercase()) {
            info!(name = %draft.name, "Already in catalog, skipping");
            skipped += 1;
            continue;
        }
        let product = catalog.create_product(draft).await?;
        info!(id = %product.id, name = %product.name, "Created product");
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    Ok(())
}
