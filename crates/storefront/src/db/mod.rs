//! Persistence for the storefront.
//!
//! # Database: `apothecary`
//!
//! All tables live in the `storefront` schema:
//!
//! - `product` - Catalog, including on-hand stock
//! - `customer_order` / `order_item` - Orders and their snapshot lines
//! - `payment_intent` - Gateway orders created for checkout payments
//! - `address` - Saved shipping addresses
//! - `wishlist_item` - Saved products
//! - `user` - Accounts provisioned by the identity provider
//! - `tower_sessions.session` - Session storage
//!
//! # Unit of work
//!
//! Services never touch a pool directly. They call [`Store::begin`], perform
//! every read and write through the returned [`Transaction`], and finish with
//! [`Transaction::commit`] or [`Transaction::rollback`]. Dropping a
//! transaction without committing rolls it back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p apothecary-cli -- migrate
//! ```

#[cfg(any(test, feature = "memory-store"))]
pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use apothecary_core::{AddressId, OrderId, OrderStatus, ProductId, UserId, WishlistItemId};

use crate::models::{
    Address, AddressDraft, ContactUpdate, NewOrder, Order, PaymentIntent, Product, ProductDraft,
    ProductFilter, User, WishlistEntry, WishlistItem,
};

#[cfg(any(test, feature = "memory-store"))]
pub use memory::MemoryStore;
pub use postgres::{PgStore, PgTransaction};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate wishlist entry).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A source of transactions.
pub trait Store: Clone + Send + Sync + 'static {
    /// Transaction type handed out by [`Store::begin`].
    type Tx: Transaction;

    /// Start a unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Cheap connectivity check for the readiness endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// One atomic unit of work.
///
/// Methods returning `Option`/`bool` report a missing row that way rather
/// than with [`RepositoryError::NotFound`], so callers choose the domain
/// error.
pub trait Transaction: Send + Sized {
    /// Make every write visible atomically.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard every write.
    fn rollback(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    // -- Catalog ------------------------------------------------------------

    fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn get_product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Lock and return the given products, in id order. Missing ids are
    /// absent from the result.
    fn lock_products(
        &mut self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn insert_product(
        &mut self,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Replace the scalar fields and append `draft.images`.
    fn update_product(
        &mut self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn set_product_images(
        &mut self,
        id: ProductId,
        images: &[String],
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a product. Order lines keep their snapshot with the product
    /// reference cleared.
    fn delete_product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Add `delta` (possibly negative) to a product's stock.
    ///
    /// Fails with [`RepositoryError::NotFound`] for an unknown product and
    /// [`RepositoryError::Conflict`] if stock would go negative.
    fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Statuses of the non-terminal orders containing `product`, one entry
    /// per order.
    fn active_order_statuses(
        &mut self,
        product: ProductId,
    ) -> impl Future<Output = Result<Vec<OrderStatus>, RepositoryError>> + Send;

    // -- Orders -------------------------------------------------------------

    /// Fails with [`RepositoryError::Conflict`] if the order's gateway order
    /// or payment already belongs to another order.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &mut self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Like [`Transaction::get_order`] but holds the order row lock until the
    /// transaction ends.
    fn lock_order(
        &mut self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Set the status and the stock-released flag, and the refund id when
    /// one is given.
    fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        refund_id: Option<&str>,
        stock_released: bool,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn update_order_contact(
        &mut self,
        id: OrderId,
        update: &ContactUpdate,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Orders newest first, optionally restricted to one user.
    fn list_orders(
        &mut self,
        user: Option<UserId>,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    // -- Payments -----------------------------------------------------------

    fn insert_payment_intent(
        &mut self,
        intent: &PaymentIntent,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn get_payment_intent(
        &mut self,
        gateway_order_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentIntent>, RepositoryError>> + Send;

    // -- Accounts -----------------------------------------------------------

    fn get_user(
        &mut self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn set_user_phone(
        &mut self,
        id: UserId,
        phone: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Default address first, then newest first.
    fn list_addresses(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Address>, RepositoryError>> + Send;

    fn get_default_address(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// Unset the default flag on all of a user's addresses.
    fn clear_default_addresses(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    fn insert_address(
        &mut self,
        user: UserId,
        draft: &AddressDraft,
        is_default: bool,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;

    fn update_address(
        &mut self,
        id: AddressId,
        draft: &AddressDraft,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// Delete one of `user`'s addresses. Other users' rows are never matched.
    fn delete_address(
        &mut self,
        user: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    // -- Wishlist -----------------------------------------------------------

    fn list_wishlist(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<WishlistEntry>, RepositoryError>> + Send;

    /// Fails with [`RepositoryError::Conflict`] if the product is already
    /// saved and [`RepositoryError::NotFound`] if it does not exist.
    fn insert_wishlist_item(
        &mut self,
        user: UserId,
        product: ProductId,
    ) -> impl Future<Output = Result<WishlistItem, RepositoryError>> + Send;

    fn delete_wishlist_item(
        &mut self,
        user: UserId,
        id: WishlistItemId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}
