//! In-memory implementation of the unit of work, for tests.
//!
//! A transaction holds the store's lock for its whole lifetime and works on a
//! private copy of the data, which replaces the shared state on commit.
//! Transactions are therefore fully serialized, which is stricter than the
//! row locks the `PostgreSQL` store takes but yields the same outcomes for
//! every operation the services perform.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use apothecary_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, ProductId, UserId, WishlistItemId,
};

use super::{RepositoryError, Store, Transaction};
use crate::models::{
    Address, AddressDraft, ContactUpdate, NewOrder, Order, OrderItem, PaymentIntent, Product,
    ProductDraft, ProductFilter, ProductSort, ProductSummary, User, WishlistEntry, WishlistItem,
};

#[derive(Debug, Clone, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    payment_intents: BTreeMap<String, PaymentIntent>,
    addresses: BTreeMap<AddressId, Address>,
    wishlist: BTreeMap<WishlistItemId, WishlistItem>,
    /// Strictly increasing clock so "newest first" is deterministic.
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp
            && now <= last
        {
            now = last + chrono::Duration::microseconds(1);
        }
        self.last_timestamp = Some(now);
        now
    }
}

/// Store keeping everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an account, as the identity provider would.
    pub async fn add_user(&self, name: Option<&str>, email: &str) -> User {
        let mut state = self.state.lock().await;
        let now = state.now();
        let user = User {
            id: UserId::generate(),
            name: name.map(str::to_owned),
            email: email.to_owned(),
            phone: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Current committed state of a product.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// Current committed state of an order.
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// An open in-memory transaction.
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
}

impl MemoryTransaction {
    fn load_order(&self, id: OrderId) -> Option<Order> {
        self.working.orders.get(&id).cloned()
    }
}

fn matches_filter(product: &Product, filter: &ProductFilter) -> bool {
    let search_ok = filter.search.as_ref().is_none_or(|term| {
        let term = term.to_lowercase();
        product.name.to_lowercase().contains(&term)
            || product.description.to_lowercase().contains(&term)
    });
    let category_ok = filter
        .category
        .as_ref()
        .is_none_or(|c| product.category.to_lowercase() == c.to_lowercase());
    search_ok && category_ok
}

impl Transaction for MemoryTransaction {
    async fn commit(mut self) -> Result<(), RepositoryError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = self
            .working
            .products
            .values()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect();

        match filter.sort {
            ProductSort::PriceAsc => products.sort_by(|a, b| {
                a.price.cmp(&b.price).then_with(|| b.created_at.cmp(&a.created_at))
            }),
            ProductSort::PriceDesc => products.sort_by(|a, b| {
                b.price.cmp(&a.price).then_with(|| b.created_at.cmp(&a.created_at))
            }),
            ProductSort::NameAsc => products.sort_by(|a, b| a.name.cmp(&b.name)),
            ProductSort::NameDesc => products.sort_by(|a, b| b.name.cmp(&a.name)),
            ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        Ok(products)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut found: Vec<Product> = ids
            .iter()
            .filter_map(|id| self.working.products.get(id).cloned())
            .collect();
        found.sort_by_key(|p| p.id);
        found.dedup_by_key(|p| p.id);
        Ok(found)
    }

    async fn insert_product(&mut self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        if draft.stock < 0 {
            return Err(RepositoryError::Conflict("stock cannot be negative".into()));
        }
        let now = self.working.now();
        let product = Product {
            id: ProductId::generate(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price,
            stock: draft.stock,
            category: draft.category.clone(),
            images: draft.images.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        if draft.stock < 0 {
            return Err(RepositoryError::Conflict("stock cannot be negative".into()));
        }
        let now = self.working.now();
        let Some(product) = self.working.products.get_mut(&id) else {
            return Ok(None);
        };
        product.name.clone_from(&draft.name);
        product.description.clone_from(&draft.description);
        product.price = draft.price;
        product.stock = draft.stock;
        product.category.clone_from(&draft.category);
        product.images.extend(draft.images.iter().cloned());
        product.updated_at = now;
        Ok(Some(product.clone()))
    }

    async fn set_product_images(
        &mut self,
        id: ProductId,
        images: &[String],
    ) -> Result<bool, RepositoryError> {
        let now = self.working.now();
        let Some(product) = self.working.products.get_mut(&id) else {
            return Ok(false);
        };
        product.images = images.to_vec();
        product.updated_at = now;
        Ok(true)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, RepositoryError> {
        if self.working.products.remove(&id).is_none() {
            return Ok(false);
        }
        for order in self.working.orders.values_mut() {
            for item in &mut order.items {
                if item.product_id == Some(id) {
                    item.product_id = None;
                }
            }
        }
        self.working.wishlist.retain(|_, w| w.product_id != id);
        Ok(true)
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<(), RepositoryError> {
        let now = self.working.now();
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let stock = product
            .stock
            .checked_add(delta)
            .filter(|s| *s >= 0)
            .ok_or_else(|| {
                RepositoryError::Conflict(format!("stock for product {id} would become negative"))
            })?;
        product.stock = stock;
        product.updated_at = now;
        Ok(())
    }

    async fn active_order_statuses(
        &mut self,
        product: ProductId,
    ) -> Result<Vec<OrderStatus>, RepositoryError> {
        let mut orders: Vec<&Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.status.is_active())
            .filter(|o| o.items.iter().any(|i| i.product_id == Some(product)))
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders.into_iter().map(|o| o.status).collect())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let payment = &order.payment;
        let reused = self.working.orders.values().any(|o| {
            (payment.gateway_order_id.is_some()
                && o.payment.gateway_order_id == payment.gateway_order_id)
                || (payment.gateway_payment_id.is_some()
                    && o.payment.gateway_payment_id == payment.gateway_payment_id)
        });
        if reused {
            return Err(RepositoryError::Conflict(
                "payment already belongs to another order".into(),
            ));
        }

        let now = self.working.now();
        let id = OrderId::generate();
        let mut items: Vec<OrderItem> = order
            .items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::generate(),
                order_id: id,
                product_id: Some(item.product_id),
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        items.sort_by(|a, b| a.product_name.cmp(&b.product_name).then(a.id.cmp(&b.id)));

        let stored = Order {
            id,
            user_id: order.user_id,
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            address: order.address.clone(),
            total: order.total,
            status: order.status,
            payment: order.payment.clone(),
            refund_id: None,
            stock_released: false,
            items,
            created_at: now,
            updated_at: now,
        };
        self.working.orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.load_order(id))
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.load_order(id))
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        refund_id: Option<&str>,
        stock_released: bool,
    ) -> Result<(), RepositoryError> {
        let now = self.working.now();
        let order = self
            .working
            .orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        if let Some(refund_id) = refund_id {
            order.refund_id = Some(refund_id.to_owned());
        }
        order.stock_released = stock_released;
        order.updated_at = now;
        Ok(())
    }

    async fn update_order_contact(
        &mut self,
        id: OrderId,
        update: &ContactUpdate,
    ) -> Result<Option<Order>, RepositoryError> {
        let now = self.working.now();
        let Some(order) = self.working.orders.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &update.customer_name {
            order.customer_name.clone_from(name);
        }
        if let Some(phone) = &update.customer_phone {
            order.customer_phone = Some(phone.clone());
        }
        if let Some(address) = &update.address {
            order.address.clone_from(address);
        }
        order.updated_at = now;
        Ok(Some(order.clone()))
    }

    async fn list_orders(&mut self, user: Option<UserId>) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| user.is_none() || o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert_payment_intent(&mut self, intent: &PaymentIntent) -> Result<(), RepositoryError> {
        if self.working.payment_intents.contains_key(&intent.gateway_order_id) {
            return Err(RepositoryError::Conflict(format!(
                "gateway order {} already recorded",
                intent.gateway_order_id
            )));
        }
        self.working
            .payment_intents
            .insert(intent.gateway_order_id.clone(), intent.clone());
        Ok(())
    }

    async fn get_payment_intent(
        &mut self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        Ok(self.working.payment_intents.get(gateway_order_id).cloned())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn set_user_phone(&mut self, id: UserId, phone: &str) -> Result<(), RepositoryError> {
        let now = self.working.now();
        let user = self
            .working
            .users
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        user.phone = Some(phone.to_owned());
        user.updated_at = now;
        Ok(())
    }

    async fn list_addresses(&mut self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let mut addresses: Vec<Address> = self
            .working
            .addresses
            .values()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn get_default_address(
        &mut self,
        user: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .working
            .addresses
            .values()
            .find(|a| a.user_id == user && a.is_default)
            .cloned())
    }

    async fn clear_default_addresses(&mut self, user: UserId) -> Result<u64, RepositoryError> {
        let now = self.working.now();
        let mut cleared = 0;
        for address in self.working.addresses.values_mut() {
            if address.user_id == user && address.is_default {
                address.is_default = false;
                address.updated_at = now;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn insert_address(
        &mut self,
        user: UserId,
        draft: &AddressDraft,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        if is_default
            && self
                .working
                .addresses
                .values()
                .any(|a| a.user_id == user && a.is_default)
        {
            return Err(RepositoryError::Conflict(
                "user already has a default address".into(),
            ));
        }
        let now = self.working.now();
        let address = Address {
            id: AddressId::generate(),
            user_id: user,
            full_name: draft.full_name.clone(),
            phone: draft.phone.clone(),
            address_line1: draft.address_line1.clone(),
            address_line2: draft.address_line2.clone(),
            city: draft.city.clone(),
            state: draft.state.clone(),
            pincode: draft.pincode.clone(),
            is_default,
            created_at: now,
            updated_at: now,
        };
        self.working.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn update_address(
        &mut self,
        id: AddressId,
        draft: &AddressDraft,
    ) -> Result<Option<Address>, RepositoryError> {
        let now = self.working.now();
        let Some(address) = self.working.addresses.get_mut(&id) else {
            return Ok(None);
        };
        address.full_name.clone_from(&draft.full_name);
        address.phone.clone_from(&draft.phone);
        address.address_line1.clone_from(&draft.address_line1);
        address.address_line2.clone_from(&draft.address_line2);
        address.city.clone_from(&draft.city);
        address.state.clone_from(&draft.state);
        address.pincode.clone_from(&draft.pincode);
        address.updated_at = now;
        Ok(Some(address.clone()))
    }

    async fn delete_address(&mut self, user: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        match self.working.addresses.get(&id) {
            Some(address) if address.user_id == user => {
                self.working.addresses.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_wishlist(&mut self, user: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let mut entries: Vec<WishlistEntry> = self
            .working
            .wishlist
            .values()
            .filter(|w| w.user_id == user)
            .filter_map(|w| {
                self.working.products.get(&w.product_id).map(|p| WishlistEntry {
                    id: w.id,
                    product: ProductSummary {
                        id: p.id,
                        name: p.name.clone(),
                        price: p.price,
                        stock: p.stock,
                        images: p.images.clone(),
                    },
                    created_at: w.created_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn insert_wishlist_item(
        &mut self,
        user: UserId,
        product: ProductId,
    ) -> Result<WishlistItem, RepositoryError> {
        if !self.working.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }
        if self
            .working
            .wishlist
            .values()
            .any(|w| w.user_id == user && w.product_id == product)
        {
            return Err(RepositoryError::Conflict(
                "product already in wishlist".into(),
            ));
        }
        let item = WishlistItem {
            id: WishlistItemId::generate(),
            user_id: user,
            product_id: product,
            created_at: self.working.now(),
        };
        self.working.wishlist.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete_wishlist_item(
        &mut self,
        user: UserId,
        id: WishlistItemId,
    ) -> Result<bool, RepositoryError> {
        match self.working.wishlist.get(&id) {
            Some(item) if item.user_id == user => {
                self.working.wishlist.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
