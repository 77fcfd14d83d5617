//! Order state machine.
//!
//! Fulfillment moves `PENDING -> CONFIRMED -> SHIPPED -> DELIVERED`, with
//! `CANCELLED` reachable from the first two by the customer and from anywhere
//! by an admin. Payment is tracked separately on [`PaymentRecord`].
//!
//! Every operation that touches stock or payment runs in one transaction
//! holding the order row lock (and the product row locks it needs).
//!
//! A payment confirmation is only accepted for a gateway order the storefront
//! created through [`OrderService::prepare_payment`], for exactly the order
//! total, and for one order.

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use apothecary_core::{CurrencyCode, OrderId, OrderStatus, UserId, to_minor_units};

use super::payments::{PaymentGateway, PaymentReconciler, RemoteOrder};
use super::{CatalogCache, CommerceError, finish, stock};
use crate::db::{RepositoryError, Store, Transaction};
use crate::models::{
    Checkout, ContactUpdate, NewOrder, NewOrderItem, Order, PaymentIntent, PaymentRecord, Principal,
    order_total,
};

/// Refund note for customer cancellations.
const CUSTOMER_CANCEL_REASON: &str = "Order cancelled by customer";
/// Refund note for admin cancellations.
const ADMIN_CANCEL_REASON: &str = "Order cancelled by admin";

/// Order service.
pub struct OrderService<'a, S, G> {
    store: &'a S,
    payments: PaymentReconciler<'a, G>,
    catalog: &'a CatalogCache,
}

impl<'a, S: Store, G: PaymentGateway> OrderService<'a, S, G> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a S, payments: PaymentReconciler<'a, G>, catalog: &'a CatalogCache) -> Self {
        Self {
            store,
            payments,
            catalog,
        }
    }

    /// Create the gateway order a checkout will pay against and remember its
    /// amount.
    ///
    /// # Errors
    ///
    /// - `CommerceError::Validation` for a non-positive or oversized amount
    /// - `CommerceError::Payment` if the gateway rejects the call
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn prepare_payment(
        &self,
        amount: Decimal,
        currency: Option<CurrencyCode>,
    ) -> Result<RemoteOrder, CommerceError> {
        let currency = currency.unwrap_or_else(|| self.payments.currency());
        let remote = self.payments.create_remote_order(amount, Some(currency)).await?;

        let intent = PaymentIntent {
            gateway_order_id: remote.id.clone(),
            amount: remote.amount,
            currency,
            created_at: chrono::Utc::now(),
        };
        let mut tx = self.store.begin().await?;
        let result = tx
            .insert_payment_intent(&intent)
            .await
            .map_err(CommerceError::from);
        if let Err(e) = finish(tx, result).await {
            error!(remote_order_id = %remote.id, error = %e, "Gateway order created but not recorded");
            return Err(e);
        }
        Ok(remote)
    }

    /// Place an order.
    ///
    /// Prices and names are read from the locked product rows; nothing the
    /// client sent about them is trusted. The order, its items and the stock
    /// decrement commit together or not at all.
    ///
    /// # Errors
    ///
    /// - `CommerceError::Payment` if a payment confirmation fails verification,
    ///   belongs to an unknown gateway order, does not cover the total, or
    ///   already paid for another order
    /// - `CommerceError::Validation` for missing guest details, unknown
    ///   products or a stale `expected_total`
    /// - `CommerceError::Stock` if any line cannot be covered
    #[instrument(skip(self, checkout), fields(user_id = ?principal.map(|p| p.user_id), lines = checkout.lines.len()))]
    pub async fn create_order(&self, principal: Option<&Principal>, checkout: Checkout) -> Result<Order, CommerceError> {
        let payment = match &checkout.payment {
            Some(confirmation) => {
                if !self.payments.verify_payment(
                    &confirmation.gateway_order_id,
                    &confirmation.gateway_payment_id,
                    &confirmation.signature,
                ) {
                    warn!(remote_order_id = %confirmation.gateway_order_id, "Payment signature mismatch");
                    return Err(CommerceError::Payment(
                        "payment signature verification failed".into(),
                    ));
                }
                PaymentRecord::verified(confirmation)
            }
            None => PaymentRecord::default(),
        };

        let mut tx = self.store.begin().await?;
        let result = Self::create_in(&mut tx, principal.map(|p| p.user_id), checkout, payment).await;
        let order = finish(tx, result).await?;

        self.catalog.invalidate();
        info!(
            order_id = %order.id,
            total = %order.total,
            payment_verified = order.payment.payment_verified,
            "Order created"
        );
        Ok(order)
    }

    async fn create_in(
        tx: &mut S::Tx,
        user_id: Option<UserId>,
        checkout: Checkout,
        payment: PaymentRecord,
    ) -> Result<Order, CommerceError> {
        let (customer_name, customer_email) = match user_id {
            Some(id) => {
                let user = tx
                    .get_user(id)
                    .await?
                    .ok_or_else(|| CommerceError::not_found("user", id))?;
                (
                    checkout
                        .customer_name
                        .or(user.name)
                        .unwrap_or_else(|| user.email.clone()),
                    checkout
                        .customer_email
                        .map_or(user.email, String::from),
                )
            }
            None => (
                checkout
                    .customer_name
                    .ok_or_else(|| CommerceError::Validation("customer name is required".into()))?,
                checkout
                    .customer_email
                    .map(String::from)
                    .ok_or_else(|| CommerceError::Validation("customer email is required".into()))?,
            ),
        };

        let products = stock::reserve(
            tx,
            checkout.lines.iter().map(|line| (line.product_id, line.quantity)),
        )
        .await?;

        let mut items = Vec::with_capacity(checkout.lines.len());
        for line in &checkout.lines {
            let product = products.get(&line.product_id).ok_or_else(|| {
                CommerceError::Validation(format!("product {} is no longer available", line.product_id))
            })?;
            items.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                price: product.price,
            });
        }

        let total = order_total(&items);
        if let Some(expected) = checkout.expected_total
            && expected != total
        {
            return Err(CommerceError::Validation(format!(
                "order total changed: expected {expected}, current total is {total}"
            )));
        }
        if let Some(gateway_order_id) = &payment.gateway_order_id {
            Self::check_paid_amount(tx, gateway_order_id, total).await?;
        }

        let order = tx
            .insert_order(&NewOrder {
                user_id,
                customer_name,
                customer_email,
                customer_phone: Some(checkout.customer_phone.into()),
                address: checkout.address,
                total,
                status: OrderStatus::Pending,
                payment,
                items,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    warn!("Payment replayed for a second order");
                    CommerceError::Payment("payment has already been used for another order".into())
                }
                other => other.into(),
            })?;
        Ok(order)
    }

    /// Require the gateway order behind a payment to be one we created, for
    /// exactly `total`.
    async fn check_paid_amount(
        tx: &mut S::Tx,
        gateway_order_id: &str,
        total: Decimal,
    ) -> Result<(), CommerceError> {
        let Some(intent) = tx.get_payment_intent(gateway_order_id).await? else {
            warn!(remote_order_id = %gateway_order_id, "Payment for an unknown gateway order");
            return Err(CommerceError::Payment(
                "payment does not belong to a checkout started here".into(),
            ));
        };

        let due = to_minor_units(total, intent.currency)
            .map_err(|e| CommerceError::Validation(e.to_string()))?;
        if due != intent.amount {
            warn!(remote_order_id = %gateway_order_id, paid = intent.amount, due, "Paid amount does not match order total");
            return Err(CommerceError::Payment(format!(
                "paid amount does not match the order total of {total} {}",
                intent.currency
            )));
        }
        Ok(())
    }

    /// Cancel an order on behalf of its owner (or an admin).
    ///
    /// A paid order is refunded first; if the refund fails nothing changes.
    ///
    /// # Errors
    ///
    /// - `CommerceError::Forbidden` if the caller does not own the order
    /// - `CommerceError::InvalidState` unless the order is pending or confirmed
    /// - `CommerceError::Refund` if the gateway refund fails
    #[instrument(skip(self, principal), fields(order_id = %id, user_id = %principal.user_id))]
    pub async fn cancel_order(&self, principal: &Principal, id: OrderId) -> Result<Order, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = self.cancel_in(&mut tx, principal, id).await;
        let (order, refund_id) = Self::settle(tx, result).await?;

        self.catalog.invalidate();
        info!(refund_id = refund_id.as_deref(), "Order cancelled");
        Ok(order)
    }

    async fn cancel_in(
        &self,
        tx: &mut S::Tx,
        principal: &Principal,
        id: OrderId,
    ) -> Result<(Order, Option<String>), CommerceError> {
        let order = tx
            .lock_order(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("order", id))?;

        if !principal.can_manage(&order) {
            warn!("Cancel attempted by non-owner");
            return Err(CommerceError::Forbidden(
                "you can only cancel your own orders".into(),
            ));
        }
        if !order.status.is_cancellable() {
            return Err(CommerceError::InvalidState {
                action: "cancel",
                status: order.status,
            });
        }

        self.move_to_cancelled(tx, order, CUSTOMER_CANCEL_REASON).await
    }

    /// Set an order's fulfillment status (admin).
    ///
    /// Moving into `CANCELLED` refunds a paid order before anything is
    /// written. Stock is credited back only for pending or confirmed orders;
    /// shipped and delivered goods are gone. Reopening a cancelled order
    /// reserves whatever stock its cancellation released. Setting the current
    /// status is a no-op.
    ///
    /// # Errors
    ///
    /// - `CommerceError::Refund` if the gateway refund fails (status unchanged)
    /// - `CommerceError::InvalidState` when reopening a refunded order
    /// - `CommerceError::Stock` if reopening a cancelled order cannot be covered
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = self.update_status_in(&mut tx, id, status).await;
        let (order, refund_id) = Self::settle(tx, result).await?;

        self.catalog.invalidate();
        info!(refund_id = refund_id.as_deref(), "Order status updated");
        Ok(order)
    }

    async fn update_status_in(
        &self,
        tx: &mut S::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(Order, Option<String>), CommerceError> {
        let order = tx
            .lock_order(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("order", id))?;

        if order.status == status {
            return Ok((order, None));
        }

        if status == OrderStatus::Cancelled {
            return self.move_to_cancelled(tx, order, ADMIN_CANCEL_REASON).await;
        }

        if order.status == OrderStatus::Cancelled {
            if order.refund_id.is_some() {
                warn!("Reopen of a refunded order refused");
                return Err(CommerceError::InvalidState {
                    action: "reopen",
                    status: order.status,
                });
            }
            if order.stock_released {
                stock::reserve(
                    tx,
                    order
                        .items
                        .iter()
                        .filter_map(|item| item.product_id.map(|p| (p, item.quantity))),
                )
                .await?;
            }
        }

        tx.set_order_status(id, status, None, false).await?;
        let order = Self::reload(tx, id).await?;
        Ok((order, None))
    }

    /// Refund (when paid and not yet refunded), set `CANCELLED`, and credit
    /// the stock back if the goods have not left the warehouse.
    async fn move_to_cancelled(
        &self,
        tx: &mut S::Tx,
        order: Order,
        reason: &str,
    ) -> Result<(Order, Option<String>), CommerceError> {
        let refund_id = match (&order.payment.gateway_payment_id, &order.refund_id) {
            (Some(payment_id), None) => Some(self.payments.refund(payment_id, reason, order.id).await?),
            _ => None,
        };

        let restock = order.status.is_cancellable();
        let written: Result<Order, CommerceError> = async {
            if restock {
                stock::release(tx, &order.items).await?;
            }
            tx.set_order_status(order.id, OrderStatus::Cancelled, refund_id.as_deref(), restock)
                .await?;
            Self::reload(tx, order.id).await
        }
        .await;

        match written {
            Ok(updated) => Ok((updated, refund_id)),
            Err(e) => {
                if let Some(refund_id) = &refund_id {
                    error!(order_id = %order.id, refund_id = %refund_id, error = %e, "Refund issued but order was not cancelled");
                }
                Err(e)
            }
        }
    }

    /// Commit a status change, reporting a refund that was issued for a
    /// change that then failed to persist.
    async fn settle(
        tx: S::Tx,
        result: Result<(Order, Option<String>), CommerceError>,
    ) -> Result<(Order, Option<String>), CommerceError> {
        let refund_id = result.as_ref().ok().and_then(|(_, r)| r.clone());
        let settled = finish(tx, result).await;
        if let (Err(e), Some(refund_id)) = (&settled, &refund_id) {
            error!(refund_id = %refund_id, error = %e, "Refund issued but order update was not committed");
        }
        settled
    }

    async fn reload(tx: &mut S::Tx, id: OrderId) -> Result<Order, CommerceError> {
        tx.get_order(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("order", id))
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no such order exists.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::reload(&mut tx, id).await;
        finish(tx, result).await
    }

    /// Every order, newest first (admin).
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_orders(None).await.map_err(CommerceError::from);
        finish(tx, result).await
    }

    /// The caller's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the query fails.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn list_orders_for_user(&self, principal: &Principal) -> Result<Vec<Order>, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .list_orders(Some(principal.user_id))
            .await
            .map_err(CommerceError::from);
        finish(tx, result).await
    }

    /// Edit an order's delivery details (admin).
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no such order exists.
    #[instrument(skip(self, update), fields(order_id = %id))]
    pub async fn update_order_contact(&self, id: OrderId, update: ContactUpdate) -> Result<Order, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.update_order_contact(id, &update).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(CommerceError::not_found("order", id)),
            Err(e) => Err(e.into()),
        };
        let order = finish(tx, result).await?;

        info!("Order contact details updated");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use apothecary_core::{CurrencyCode, Phone, ProductId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{CheckoutLine, PaymentConfirmation, ProductDraft};
    use crate::services::payments::{FakeGateway, SignatureVerifier};

    struct Fixture {
        store: MemoryStore,
        gateway: FakeGateway,
        verifier: SignatureVerifier,
        cache: CatalogCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                gateway: FakeGateway::new(),
                verifier: SignatureVerifier::new(SecretString::from("kx8Qm2vLp9Rt4Wz7")),
                cache: CatalogCache::new(Duration::from_secs(30)),
            }
        }

        fn orders(&self) -> OrderService<'_, MemoryStore, FakeGateway> {
            OrderService::new(
                &self.store,
                PaymentReconciler::new(&self.gateway, &self.verifier, CurrencyCode::INR),
                &self.cache,
            )
        }

        async fn product(&self, name: &str, price: &str, stock: i32) -> ProductId {
            let mut tx = self.store.begin().await.unwrap();
            let product = tx
                .insert_product(&ProductDraft {
                    name: name.into(),
                    description: String::new(),
                    price: Decimal::from_str(price).unwrap(),
                    stock,
                    category: "Vitamins".into(),
                    images: vec![],
                })
                .await
                .unwrap();
            tx.commit().await.unwrap();
            product.id
        }

        /// Start a payment for `total` and return the signed confirmation
        /// the checkout widget would hand back.
        async fn paid(&self, total: &str, payment_id: &str) -> PaymentConfirmation {
            let remote = self
                .orders()
                .prepare_payment(Decimal::from_str(total).unwrap(), None)
                .await
                .unwrap();
            PaymentConfirmation {
                signature: self.verifier.sign(&remote.id, payment_id).unwrap(),
                gateway_order_id: remote.id,
                gateway_payment_id: payment_id.into(),
            }
        }
    }

    fn checkout(lines: &[(ProductId, i32)]) -> Checkout {
        Checkout {
            customer_name: Some("Asha Rao".into()),
            customer_email: Some(apothecary_core::Email::parse("asha@example.com").unwrap()),
            customer_phone: Phone::parse("+91 98765 43210").unwrap(),
            address: "12 MG Road, Bengaluru".into(),
            lines: lines
                .iter()
                .map(|&(product_id, quantity)| CheckoutLine {
                    product_id,
                    quantity,
                })
                .collect(),
            expected_total: None,
            payment: None,
        }
    }

    #[tokio::test]
    async fn test_create_snapshots_prices_and_decrements_stock() {
        let fx = Fixture::new();
        let a = fx.product("DANIQUE D3 60K", "10.00", 5).await;
        let b = fx.product("SLATY-OD", "2.50", 3).await;

        let order = fx
            .orders()
            .create_order(None, checkout(&[(a, 2), (b, 1)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Decimal::from_str("22.50").unwrap());
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_name, "DANIQUE D3 60K");
        assert!(!order.payment.payment_verified);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 3);
        assert_eq!(fx.store.product(b).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_create_is_all_or_nothing() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let b = fx.product("B", "1.00", 1).await;

        let err = fx
            .orders()
            .create_order(None, checkout(&[(a, 2), (b, 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, CommerceError::Stock { available: 1, requested: 2, .. }));
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_guest_needs_name_and_email() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;

        let mut input = checkout(&[(a, 1)]);
        input.customer_email = None;
        let err = fx.orders().create_order(None, input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_logged_in_user_defaults_to_account_details() {
        let fx = Fixture::new();
        let user = fx.store.add_user(Some("Ravi"), "ravi@example.com").await;
        let a = fx.product("A", "1.00", 5).await;

        let mut input = checkout(&[(a, 1)]);
        input.customer_name = None;
        input.customer_email = None;
        let order = fx
            .orders()
            .create_order(Some(&Principal::customer(user.id)), input)
            .await
            .unwrap();

        assert_eq!(order.user_id, Some(user.id));
        assert_eq!(order.customer_name, "Ravi");
        assert_eq!(order.customer_email, "ravi@example.com");
    }

    #[tokio::test]
    async fn test_expected_total_mismatch_rejected() {
        let fx = Fixture::new();
        let a = fx.product("A", "10.00", 5).await;

        let mut input = checkout(&[(a, 2)]);
        input.expected_total = Some(Decimal::from(15));
        let err = fx.orders().create_order(None, input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));

        let mut input = checkout(&[(a, 2)]);
        input.expected_total = Some(Decimal::from_str("20.00").unwrap());
        assert!(fx.orders().create_order(None, input).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_product_is_validation_error() {
        let fx = Fixture::new();
        let err = fx
            .orders()
            .create_order(None, checkout(&[(ProductId::generate(), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bad_signature_writes_nothing() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;

        let mut input = checkout(&[(a, 1)]);
        let mut payment = fx.paid("1.00", "pay_B").await;
        payment.gateway_payment_id = "pay_C".into();
        input.payment = Some(payment);

        let err = fx.orders().create_order(None, input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Payment(_)));
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_verified_payment_recorded() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;

        let mut input = checkout(&[(a, 1)]);
        input.payment = Some(fx.paid("1.00", "pay_B").await);
        let order = fx.orders().create_order(None, input).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment.payment_verified);
        assert_eq!(order.payment.gateway_payment_id.as_deref(), Some("pay_B"));
    }

    #[tokio::test]
    async fn test_replayed_payment_is_rejected() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let payment = fx.paid("1.00", "pay_B").await;

        let mut first = checkout(&[(a, 1)]);
        first.payment = Some(payment.clone());
        fx.orders().create_order(None, first).await.unwrap();

        let mut replay = checkout(&[(a, 1)]);
        replay.payment = Some(payment);
        let err = fx.orders().create_order(None, replay).await.unwrap_err();

        assert!(matches!(err, CommerceError::Payment(_)));
        assert_eq!(fx.store.order_count().await, 1);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_payment_must_cover_order_total() {
        let fx = Fixture::new();
        let a = fx.product("A", "250.00", 5).await;

        let mut input = checkout(&[(a, 2)]);
        input.payment = Some(fx.paid("10.00", "pay_B").await);
        let err = fx.orders().create_order(None, input).await.unwrap_err();

        assert!(matches!(err, CommerceError::Payment(_)));
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_payment_for_unknown_gateway_order_rejected() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;

        let mut input = checkout(&[(a, 1)]);
        input.payment = Some(PaymentConfirmation {
            gateway_order_id: "order_elsewhere".into(),
            gateway_payment_id: "pay_B".into(),
            signature: fx.verifier.sign("order_elsewhere", "pay_B").unwrap(),
        });
        let err = fx.orders().create_order(None, input).await.unwrap_err();

        assert!(matches!(err, CommerceError::Payment(_)));
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_owner_cancel_credits_stock_once() {
        let fx = Fixture::new();
        let user = fx.store.add_user(None, "owner@example.com").await;
        let principal = Principal::customer(user.id);
        let a = fx.product("A", "1.00", 5).await;

        let order = fx
            .orders()
            .create_order(Some(&principal), checkout(&[(a, 2)]))
            .await
            .unwrap();
        let cancelled = fx.orders().cancel_order(&principal, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);

        let err = fx.orders().cancel_order(&principal, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidState {
                status: OrderStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_stranger_cannot_cancel() {
        let fx = Fixture::new();
        let owner = fx.store.add_user(None, "owner@example.com").await;
        let a = fx.product("A", "1.00", 5).await;
        let order = fx
            .orders()
            .create_order(Some(&Principal::customer(owner.id)), checkout(&[(a, 1)]))
            .await
            .unwrap();

        let stranger = Principal::customer(UserId::generate());
        let err = fx.orders().cancel_order(&stranger, order.id).await.unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));

        let admin = Principal::admin(UserId::generate());
        assert!(fx.orders().cancel_order(&admin, order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_shipped_order_cannot_be_cancelled_by_customer() {
        let fx = Fixture::new();
        let owner = fx.store.add_user(None, "owner@example.com").await;
        let principal = Principal::customer(owner.id);
        let a = fx.product("A", "1.00", 5).await;
        let order = fx
            .orders()
            .create_order(Some(&principal), checkout(&[(a, 1)]))
            .await
            .unwrap();
        fx.orders()
            .update_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let err = fx.orders().cancel_order(&principal, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidState {
                status: OrderStatus::Shipped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_admin_cancel_refunds_before_persisting() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let mut input = checkout(&[(a, 1)]);
        input.payment = Some(fx.paid("1.00", "pay_B").await);
        let order = fx.orders().create_order(None, input).await.unwrap();

        let cancelled = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let refunds = fx.gateway.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].payment_id, "pay_B");
        assert_eq!(refunds[0].notes["reason"], ADMIN_CANCEL_REASON);
        assert_eq!(cancelled.refund_id.as_deref(), Some(refunds[0].refund_id.as_str()));
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_refund_failure_leaves_order_unchanged() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let mut input = checkout(&[(a, 1)]);
        input.payment = Some(fx.paid("1.00", "pay_B").await);
        let order = fx.orders().create_order(None, input).await.unwrap();

        fx.gateway.fail_refunds(true);
        let err = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();

        assert!(matches!(err, CommerceError::Refund(_)));
        let stored = fx.store.order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.refund_id, None);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_cancel_after_delivery_refunds_without_restock() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 3).await;
        let mut input = checkout(&[(a, 3)]);
        input.payment = Some(fx.paid("3.00", "pay_B").await);
        let order = fx.orders().create_order(None, input).await.unwrap();
        fx.orders()
            .update_order_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();

        let cancelled = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.gateway.refunds().len(), 1);
        assert_eq!(fx.store.product(a).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_reopen_after_shipped_cancel_takes_no_stock() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 3).await;
        let order = fx.orders().create_order(None, checkout(&[(a, 2)])).await.unwrap();
        for status in [OrderStatus::Shipped, OrderStatus::Cancelled, OrderStatus::Shipped] {
            fx.orders().update_order_status(order.id, status).await.unwrap();
        }
        assert_eq!(fx.store.product(a).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_refunded_order_cannot_be_reopened() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let mut input = checkout(&[(a, 1)]);
        input.payment = Some(fx.paid("1.00", "pay_B").await);
        let order = fx.orders().create_order(None, input).await.unwrap();
        fx.orders()
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommerceError::InvalidState {
                status: OrderStatus::Cancelled,
                ..
            }
        ));
        let stored = fx.store.order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.refund_id.is_some());
        assert_eq!(fx.store.product(a).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_same_status_is_noop() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let order = fx.orders().create_order(None, checkout(&[(a, 1)])).await.unwrap();

        let same = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(same, order);
    }

    #[tokio::test]
    async fn test_reopen_cancelled_order_reserves_stock() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 2).await;
        let order = fx.orders().create_order(None, checkout(&[(a, 2)])).await.unwrap();
        fx.orders()
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(fx.store.product(a).await.unwrap().stock, 2);

        // Someone else buys one in the meantime.
        fx.orders().create_order(None, checkout(&[(a, 1)])).await.unwrap();

        let err = fx
            .orders()
            .update_order_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Stock { .. }));
        assert_eq!(
            fx.store.order(order.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_update_contact() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 5).await;
        let order = fx.orders().create_order(None, checkout(&[(a, 1)])).await.unwrap();

        let updated = fx
            .orders()
            .update_order_contact(
                order.id,
                ContactUpdate {
                    address: Some("221B Baker Street".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "221B Baker Street");
        assert_eq!(updated.customer_name, "Asha Rao");

        let err = fx
            .orders()
            .update_order_contact(OrderId::generate(), ContactUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_orders_for_user_only_returns_own() {
        let fx = Fixture::new();
        let a = fx.product("A", "1.00", 10).await;
        let mine = fx.store.add_user(None, "me@example.com").await;
        let me = Principal::customer(mine.id);

        fx.orders().create_order(Some(&me), checkout(&[(a, 1)])).await.unwrap();
        fx.orders().create_order(None, checkout(&[(a, 1)])).await.unwrap();

        assert_eq!(fx.orders().list_orders_for_user(&me).await.unwrap().len(), 1);
        assert_eq!(fx.orders().list_orders().await.unwrap().len(), 2);
    }
}
