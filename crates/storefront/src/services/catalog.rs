//! Catalog reads and admin catalog management.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::{info, instrument, warn};

use apothecary_core::{OrderStatus, ProductId};

use super::{CommerceError, finish};
use crate::db::{Store, Transaction};
use crate::models::{Product, ProductDraft, ProductFilter};

/// Maximum number of distinct listing queries kept in the cache.
const MAX_CACHED_LISTINGS: u64 = 1_000;

/// Short-lived cache of product listings keyed by normalized filter.
///
/// Every catalog or stock mutation calls [`CatalogCache::invalidate`].
/// A listing read before an invalidation is never stored after it.
#[derive(Clone)]
pub struct CatalogCache {
    listings: Cache<ProductFilter, Arc<Vec<Product>>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.listings.entry_count())
            .finish()
    }
}

impl CatalogCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            listings: Cache::builder()
                .max_capacity(MAX_CACHED_LISTINGS)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn get(&self, filter: &ProductFilter) -> Option<Arc<Vec<Product>>> {
        self.listings.get(filter).await
    }

    /// Store a listing read at generation `seen`, unless an invalidation
    /// has happened since.
    async fn insert(&self, filter: ProductFilter, products: Arc<Vec<Product>>, seen: u64) {
        if self.generation() != seen {
            return;
        }
        self.listings.insert(filter.clone(), products).await;
        // An invalidation may have landed between the check and the insert
        if self.generation() != seen {
            self.listings.invalidate(&filter).await;
        }
    }

    /// Drop every cached listing.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.listings.invalidate_all();
    }
}

/// Catalog service.
pub struct CatalogService<'a, S> {
    store: &'a S,
    cache: &'a CatalogCache,
}

impl<'a, S: Store> CatalogService<'a, S> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a S, cache: &'a CatalogCache) -> Self {
        Self { store, cache }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>, CommerceError> {
        if let Some(cached) = self.cache.get(&filter).await {
            return Ok(cached.as_ref().clone());
        }

        let seen = self.cache.generation();
        let mut tx = self.store.begin().await?;
        let result = tx.list_products(&filter).await.map_err(CommerceError::from);
        let products = finish(tx, result).await?;

        self.cache.insert(filter, Arc::new(products.clone()), seen).await;
        Ok(products)
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx.get_product(id).await.map_err(CommerceError::from);
        finish(tx, result)
            .await?
            .ok_or_else(|| CommerceError::not_found("product", id))
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the insert fails.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx.insert_product(&draft).await.map_err(CommerceError::from);
        let product = finish(tx, result).await?;

        self.cache.invalidate();
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Replace a product's fields and append any new image references.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no such product exists.
    #[instrument(skip(self, draft), fields(product_id = %id))]
    pub async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.update_product(id, &draft).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(CommerceError::not_found("product", id)),
            Err(e) => Err(e.into()),
        };
        let product = finish(tx, result).await?;

        self.cache.invalidate();
        info!(stock = product.stock, "Product updated");
        Ok(product)
    }

    /// Remove one image reference from a product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist or
    /// does not carry `image`.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove_product_image(&self, id: ProductId, image: &str) -> Result<Product, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::remove_image_in(&mut tx, id, image).await;
        let product = finish(tx, result).await?;

        self.cache.invalidate();
        info!("Product image removed");
        Ok(product)
    }

    async fn remove_image_in(tx: &mut S::Tx, id: ProductId, image: &str) -> Result<Product, CommerceError> {
        let mut product = tx
            .get_product(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("product", id))?;

        let before = product.images.len();
        product.images.retain(|i| i != image);
        if product.images.len() == before {
            return Err(CommerceError::NotFound(format!("image {image} on product {id}")));
        }

        tx.set_product_images(id, &product.images).await?;
        tx.get_product(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("product", id))
    }

    /// Delete a product that no open order refers to.
    ///
    /// Returns the product's image references so the caller can release the
    /// stored files.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Conflict` listing the statuses of the blocking
    /// orders, or `CommerceError::NotFound` if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<Vec<String>, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::delete_in(&mut tx, id).await;
        let images = finish(tx, result).await?;

        self.cache.invalidate();
        info!("Product deleted");
        Ok(images)
    }

    async fn delete_in(tx: &mut S::Tx, id: ProductId) -> Result<Vec<String>, CommerceError> {
        // Locking the row makes a concurrent checkout of this product wait.
        let product = tx
            .lock_products(&[id])
            .await?
            .pop()
            .ok_or_else(|| CommerceError::not_found("product", id))?;

        let blocking = tx.active_order_statuses(id).await?;
        if !blocking.is_empty() {
            warn!(orders = blocking.len(), "Product delete blocked by active orders");
            return Err(CommerceError::Conflict {
                message: blocked_delete_message(&blocking),
                blocking_statuses: blocking,
            });
        }

        if !tx.delete_product(id).await? {
            return Err(CommerceError::not_found("product", id));
        }
        Ok(product.images)
    }
}

fn blocked_delete_message(statuses: &[OrderStatus]) -> String {
    let mut distinct: Vec<&str> = Vec::new();
    for status in statuses {
        if !distinct.contains(&status.as_str()) {
            distinct.push(status.as_str());
        }
    }
    format!(
        "cannot delete product with active orders: {} order(s) are {}; wait until they are delivered or cancelled",
        statuses.len(),
        distinct.join(", ")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{ProductQuery, ProductSort};

    fn draft(name: &str, category: &str, price: i64) -> ProductDraft {
        ProductDraft {
            name: name.into(),
            description: format!("{name} tablets"),
            price: Decimal::from(price),
            stock: 10,
            category: category.into(),
            images: vec![format!("/uploads/{name}.jpg")],
        }
    }

    fn cache() -> CatalogCache {
        CatalogCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let store = MemoryStore::new();
        let cache = cache();
        let catalog = CatalogService::new(&store, &cache);
        catalog.create_product(draft("Bravo", "Diabetes", 30)).await.unwrap();
        catalog.create_product(draft("Alpha", "diabetes", 20)).await.unwrap();
        catalog.create_product(draft("Charlie", "Vitamins", 10)).await.unwrap();

        let filter = ProductFilter::from(ProductQuery {
            search: None,
            category: Some("DIABETES".into()),
            sort: Some("price_asc".into()),
        });
        let names: Vec<_> = catalog
            .list_products(filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Alpha", "Bravo"]);

        let filter = ProductFilter {
            search: Some("CHARLIE tab".into()),
            ..Default::default()
        };
        assert_eq!(catalog.list_products(filter).await.unwrap().len(), 1);

        let newest = catalog.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(newest.first().unwrap().name, "Charlie");
        assert_eq!(ProductFilter::default().sort, ProductSort::Newest);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cached_listing() {
        let store = MemoryStore::new();
        let cache = cache();
        let catalog = CatalogService::new(&store, &cache);
        catalog.create_product(draft("Alpha", "A", 1)).await.unwrap();

        assert_eq!(catalog.list_products(ProductFilter::default()).await.unwrap().len(), 1);
        catalog.create_product(draft("Bravo", "A", 1)).await.unwrap();
        assert_eq!(catalog.list_products(ProductFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_read_before_invalidation_is_not_cached() {
        let cache = cache();
        let seen = cache.generation();

        // A mutation commits while the listing is still being read
        cache.invalidate();
        cache
            .insert(ProductFilter::default(), Arc::new(Vec::new()), seen)
            .await;
        assert!(cache.get(&ProductFilter::default()).await.is_none());

        let seen = cache.generation();
        cache
            .insert(ProductFilter::default(), Arc::new(Vec::new()), seen)
            .await;
        assert!(cache.get(&ProductFilter::default()).await.is_some());
    }

    #[tokio::test]
    async fn test_update_appends_images() {
        let store = MemoryStore::new();
        let cache = cache();
        let catalog = CatalogService::new(&store, &cache);
        let product = catalog.create_product(draft("Alpha", "A", 1)).await.unwrap();

        let mut update = draft("Alpha Plus", "A", 2);
        update.images = vec!["/uploads/second.jpg".into()];
        let updated = catalog.update_product(product.id, update).await.unwrap();

        assert_eq!(updated.name, "Alpha Plus");
        assert_eq!(updated.images, ["/uploads/Alpha.jpg", "/uploads/second.jpg"]);
    }

    #[tokio::test]
    async fn test_remove_image() {
        let store = MemoryStore::new();
        let cache = cache();
        let catalog = CatalogService::new(&store, &cache);
        let product = catalog.create_product(draft("Alpha", "A", 1)).await.unwrap();

        let updated = catalog
            .remove_product_image(product.id, "/uploads/Alpha.jpg")
            .await
            .unwrap();
        assert!(updated.images.is_empty());

        let err = catalog
            .remove_product_image(product.id, "/uploads/Alpha.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_unreferenced_product() {
        let store = MemoryStore::new();
        let cache = cache();
        let catalog = CatalogService::new(&store, &cache);
        let product = catalog.create_product(draft("Alpha", "A", 1)).await.unwrap();

        let images = catalog.delete_product(product.id).await.unwrap();
        assert_eq!(images, ["/uploads/Alpha.jpg"]);
        assert!(matches!(
            catalog.get_product(product.id).await,
            Err(CommerceError::NotFound(_))
        ));
    }

    #[test]
    fn test_blocked_delete_message() {
        let message = blocked_delete_message(&[
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Pending,
        ]);
        assert!(message.contains("3 order(s) are PENDING, SHIPPED"));
    }
}
