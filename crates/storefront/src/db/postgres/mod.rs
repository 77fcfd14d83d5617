//! `PostgreSQL` implementation of the unit of work.
//!
//! Queries are built at runtime with `sqlx::query_as` and internal row types,
//! so the crate compiles without a live database.

mod accounts;
mod orders;
mod products;

use sqlx::{PgPool, Postgres};

use apothecary_core::{AddressId, OrderId, OrderStatus, ProductId, UserId, WishlistItemId};

use super::{RepositoryError, Store, Transaction};
use crate::models::{
    Address, AddressDraft, ContactUpdate, NewOrder, Order, PaymentIntent, Product, ProductDraft,
    ProductFilter, User, WishlistEntry, WishlistItem,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// An open database transaction. Dropping it without committing rolls back.
#[derive(Debug)]
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl Transaction for PgTransaction {
    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        products::list(&mut self.tx, filter).await
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        products::get(&mut self.tx, id).await
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        products::lock(&mut self.tx, ids).await
    }

    async fn insert_product(&mut self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        products::insert(&mut self.tx, draft).await
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        products::update(&mut self.tx, id, draft).await
    }

    async fn set_product_images(
        &mut self,
        id: ProductId,
        images: &[String],
    ) -> Result<bool, RepositoryError> {
        products::set_images(&mut self.tx, id, images).await
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, RepositoryError> {
        products::delete(&mut self.tx, id).await
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<(), RepositoryError> {
        products::adjust_stock(&mut self.tx, id, delta).await
    }

    async fn active_order_statuses(
        &mut self,
        product: ProductId,
    ) -> Result<Vec<OrderStatus>, RepositoryError> {
        products::active_order_statuses(&mut self.tx, product).await
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        orders::insert(&mut self.tx, order).await
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        orders::get(&mut self.tx, id).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        orders::lock(&mut self.tx, id).await
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        refund_id: Option<&str>,
        stock_released: bool,
    ) -> Result<(), RepositoryError> {
        orders::set_status(&mut self.tx, id, status, refund_id, stock_released).await
    }

    async fn update_order_contact(
        &mut self,
        id: OrderId,
        update: &ContactUpdate,
    ) -> Result<Option<Order>, RepositoryError> {
        orders::update_contact(&mut self.tx, id, update).await
    }

    async fn list_orders(&mut self, user: Option<UserId>) -> Result<Vec<Order>, RepositoryError> {
        orders::list(&mut self.tx, user).await
    }

    async fn insert_payment_intent(&mut self, intent: &PaymentIntent) -> Result<(), RepositoryError> {
        orders::insert_intent(&mut self.tx, intent).await
    }

    async fn get_payment_intent(
        &mut self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        orders::get_intent(&mut self.tx, gateway_order_id).await
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        accounts::get_user(&mut self.tx, id).await
    }

    async fn set_user_phone(&mut self, id: UserId, phone: &str) -> Result<(), RepositoryError> {
        accounts::set_user_phone(&mut self.tx, id, phone).await
    }

    async fn list_addresses(&mut self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        accounts::list_addresses(&mut self.tx, user).await
    }

    async fn get_default_address(
        &mut self,
        user: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        accounts::get_default_address(&mut self.tx, user).await
    }

    async fn clear_default_addresses(&mut self, user: UserId) -> Result<u64, RepositoryError> {
        accounts::clear_default_addresses(&mut self.tx, user).await
    }

    async fn insert_address(
        &mut self,
        user: UserId,
        draft: &AddressDraft,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        accounts::insert_address(&mut self.tx, user, draft, is_default).await
    }

    async fn update_address(
        &mut self,
        id: AddressId,
        draft: &AddressDraft,
    ) -> Result<Option<Address>, RepositoryError> {
        accounts::update_address(&mut self.tx, id, draft).await
    }

    async fn delete_address(&mut self, user: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        accounts::delete_address(&mut self.tx, user, id).await
    }

    async fn list_wishlist(&mut self, user: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        accounts::list_wishlist(&mut self.tx, user).await
    }

    async fn insert_wishlist_item(
        &mut self,
        user: UserId,
        product: ProductId,
    ) -> Result<WishlistItem, RepositoryError> {
        accounts::insert_wishlist_item(&mut self.tx, user, product).await
    }

    async fn delete_wishlist_item(
        &mut self,
        user: UserId,
        id: WishlistItemId,
    ) -> Result<bool, RepositoryError> {
        accounts::delete_wishlist_item(&mut self.tx, user, id).await
    }
}

/// Map CHECK and unique violations to [`RepositoryError::Conflict`].
fn map_constraint(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_check_violation() || db_err.is_unique_violation())
    {
        return RepositoryError::Conflict(db_err.message().to_owned());
    }
    RepositoryError::Database(e)
}

fn parse_status(raw: &str) -> Result<OrderStatus, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid order status in database: {e}")))
}
