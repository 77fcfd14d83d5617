//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use apothecary_core::CurrencyCode;

use crate::db::Store;
use crate::services::{
    AccountService, CatalogCache, CatalogService, OrderService, PaymentGateway, PaymentReconciler,
    SignatureVerifier, WishlistService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the services,
/// each borrowing the shared store, gateway and cache.
pub struct AppState<S, G> {
    inner: Arc<AppStateInner<S, G>>,
}

impl<S, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S, G> {
    store: S,
    gateway: G,
    verifier: SignatureVerifier,
    currency: CurrencyCode,
    catalog_cache: CatalogCache,
}

impl<S: Store, G: PaymentGateway> AppState<S, G> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `gateway` - Payment gateway client
    /// * `verifier` - Payment confirmation verifier (holds the key secret)
    /// * `currency` - Currency for gateway orders
    /// * `catalog_cache_ttl` - Product listing cache lifetime
    #[must_use]
    pub fn new(
        store: S,
        gateway: G,
        verifier: SignatureVerifier,
        currency: CurrencyCode,
        catalog_cache_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                gateway,
                verifier,
                currency,
                catalog_cache: CatalogCache::new(catalog_cache_ttl),
            }),
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Payment operations.
    #[must_use]
    pub fn payments(&self) -> PaymentReconciler<'_, G> {
        PaymentReconciler::new(&self.inner.gateway, &self.inner.verifier, self.inner.currency)
    }

    /// Catalog reads and admin catalog management.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(&self.inner.store, &self.inner.catalog_cache)
    }

    /// Order state machine.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_, S, G> {
        OrderService::new(&self.inner.store, self.payments(), &self.inner.catalog_cache)
    }

    /// Addresses and profile.
    #[must_use]
    pub fn accounts(&self) -> AccountService<'_, S> {
        AccountService::new(&self.inner.store)
    }

    /// Wishlist.
    #[must_use]
    pub fn wishlist(&self) -> WishlistService<'_, S> {
        WishlistService::new(&self.inner.store)
    }
}
