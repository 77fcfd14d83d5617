//! End-to-end tests for the Apothecary storefront.
//!
//! Tests run the real services and router against the in-memory store and
//! the scripted fake gateway, so no database or network is needed:
//!
//! ```bash
//! cargo test -p apothecary-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout` - Order creation, stock and payment verification
//! - `cancellation` - Cancellation, refunds and admin status changes
//! - `catalog` - Product deletion guard
//! - `accounts` - Addresses and profile
//! - `http` - Full request path through the axum router
//! - `postgres` - The same flows against a real database (ignored by default,
//!   needs `DATABASE_URL`)

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use apothecary_core::{CurrencyCode, ProductId};
use apothecary_storefront::db::MemoryStore;
use apothecary_storefront::models::{Checkout, CheckoutRequest, PaymentConfirmation, Principal, ProductRequest};
use apothecary_storefront::routes;
use apothecary_storefront::services::SignatureVerifier;
use apothecary_storefront::services::payments::FakeGateway;
use apothecary_storefront::state::AppState;

/// Merchant key secret shared by the fake gateway and the verifier.
pub const KEY_SECRET: &str = "kx8Qm2vLp9Rt4Wz7";

/// Application state over the in-memory store and fake gateway.
pub type TestState = AppState<MemoryStore, FakeGateway>;

/// A storefront with handles on its store and gateway.
pub struct TestContext {
    pub state: TestState,
    pub store: MemoryStore,
    pub gateway: FakeGateway,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let state = AppState::new(
            store.clone(),
            gateway.clone(),
            verifier(),
            CurrencyCode::INR,
            Duration::from_secs(30),
        );
        Self {
            state,
            store,
            gateway,
        }
    }

    /// Create a product through the catalog service.
    pub async fn product(&self, name: &str, price: &str, stock: i32) -> ProductId {
        let draft = ProductRequest {
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::from_str(price).unwrap(),
            stock,
            category: "Vitamins".to_owned(),
            images: vec![format!("{}.jpg", name.to_lowercase())],
        }
        .validate()
        .unwrap();
        self.state.catalog().create_product(draft).await.unwrap().id
    }

    /// Committed stock of a product.
    pub async fn stock(&self, id: ProductId) -> i32 {
        self.store.product(id).await.unwrap().stock
    }

    /// Start a gateway payment for `total` and return the confirmation the
    /// checkout widget would hand back once `payment_id` is captured.
    pub async fn pay(&self, total: &str, payment_id: &str) -> PaymentConfirmation {
        let remote = self
            .state
            .orders()
            .prepare_payment(Decimal::from_str(total).unwrap(), None)
            .await
            .unwrap();
        paid(&remote.id, payment_id)
    }

    /// Provision a customer account and return its principal.
    pub async fn customer(&self, name: &str, email: &str) -> Principal {
        let user = self.store.add_user(Some(name), email).await;
        Principal::customer(user.id)
    }

    /// Send one request through the full router, optionally as `principal`.
    pub async fn send(
        &self,
        principal: Option<Principal>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = routes::router()
            .with_state(self.state.clone())
            .layer(axum::middleware::from_fn(
                move |mut request: Request, next: Next| async move {
                    if let Some(principal) = principal {
                        request.extensions_mut().insert(principal);
                    }
                    next.run(request).await
                },
            ));

        let builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.20");
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

/// Verifier holding [`KEY_SECRET`].
#[must_use]
pub fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(SecretString::from(KEY_SECRET))
}

/// A correctly signed payment confirmation for an arbitrary gateway order.
#[must_use]
pub fn paid(order_id: &str, payment_id: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        gateway_order_id: order_id.to_owned(),
        gateway_payment_id: payment_id.to_owned(),
        signature: verifier().sign(order_id, payment_id).unwrap(),
    }
}

/// Guest checkout body for the given `(product, quantity)` lines.
#[must_use]
pub fn checkout_body(lines: &[(ProductId, i64)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, quantity)| json!({ "product_id": id, "quantity": quantity }))
        .collect();
    json!({
        "customer_name": "Asha Rao",
        "customer_email": "asha@example.com",
        "customer_phone": "+91 98450 12345",
        "address": "12 MG Road, Bengaluru 560001",
        "items": items,
    })
}

/// Validated guest checkout, optionally carrying a payment confirmation.
#[must_use]
pub fn checkout(lines: &[(ProductId, i64)], payment: Option<PaymentConfirmation>) -> Checkout {
    let request: CheckoutRequest = serde_json::from_value(checkout_body(lines)).unwrap();
    let mut checkout = request.validate().unwrap();
    checkout.payment = payment;
    checkout
}
