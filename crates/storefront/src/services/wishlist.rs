//! Wishlist service.

use tracing::{info, instrument};

use apothecary_core::{ProductId, WishlistItemId};

use super::{CommerceError, finish};
use crate::db::{RepositoryError, Store, Transaction};
use crate::models::{Principal, WishlistEntry, WishlistItem};

/// Wishlist service.
pub struct WishlistService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> WishlistService<'a, S> {
    /// Create a new wishlist service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The caller's saved products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the query fails.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn list(&self, principal: &Principal) -> Result<Vec<WishlistEntry>, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .list_wishlist(principal.user_id)
            .await
            .map_err(CommerceError::from);
        finish(tx, result).await
    }

    /// Save a product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Conflict` if it is already saved and
    /// `CommerceError::NotFound` if the product does not exist.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, product_id = %product))]
    pub async fn add(&self, principal: &Principal, product: ProductId) -> Result<WishlistItem, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.insert_wishlist_item(principal.user_id, product).await {
            Ok(item) => Ok(item),
            Err(RepositoryError::Conflict(_)) => Err(CommerceError::Conflict {
                message: "product already in wishlist".into(),
                blocking_statuses: Vec::new(),
            }),
            Err(RepositoryError::NotFound) => Err(CommerceError::not_found("product", product)),
            Err(e) => Err(e.into()),
        };
        let item = finish(tx, result).await?;

        info!(item_id = %item.id, "Added to wishlist");
        Ok(item)
    }

    /// Remove one of the caller's saved products.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the caller has no such entry.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, item_id = %id))]
    pub async fn remove(&self, principal: &Principal, id: WishlistItemId) -> Result<(), CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.delete_wishlist_item(principal.user_id, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CommerceError::not_found("wishlist item", id)),
            Err(e) => Err(e.into()),
        };
        finish(tx, result).await
    }
}
