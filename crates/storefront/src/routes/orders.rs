//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use apothecary_core::OrderId;

use super::{ApiJson, parse_id};
use crate::db::Store;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalPrincipal, RequirePrincipal};
use crate::models::{CheckoutRequest, Order, OrderTracking};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Place an order as a guest or a signed-in customer.
pub async fn create<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    OptionalPrincipal(principal): OptionalPrincipal,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let checkout = request.validate()?;
    let order = state
        .orders()
        .create_order(principal.as_ref(), checkout)
        .await?;

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    Ok((StatusCode::CREATED, Json(order)))
}

/// Public tracking view of an order.
pub async fn track<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<OrderTracking>> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state.orders().get_order(id).await?;
    Ok(Json(order.into()))
}

/// Cancel an order as its owner or an admin.
pub async fn cancel<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state.orders().cancel_order(&principal, id).await?;

    let order_id = order.id.to_string();
    add_breadcrumb("orders", "Order cancelled", Some(&[("order_id", order_id.as_str())]));
    Ok(Json(order))
}

/// The caller's own orders, newest first.
pub async fn mine<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_orders_for_user(&principal).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use apothecary_core::UserId;

    use crate::models::Principal;
    use crate::routes::test_support::{KEY_SECRET, TestState, send, state};
    use crate::services::SignatureVerifier;

    async fn seed_product(state: &TestState, stock: i32) -> String {
        let admin = Some(Principal::admin(UserId::generate()));
        let (status, body) = send(
            state,
            admin,
            Method::POST,
            "/admin/api/products",
            Some(json!({
                "name": "Ashwagandha",
                "price": "10.00",
                "stock": stock,
                "category": "Herbal",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_owned()
    }

    fn checkout(product: &str, quantity: i64) -> Value {
        json!({
            "customer_name": "Asha Rao",
            "customer_email": "asha@example.com",
            "customer_phone": "+91 98450 12345",
            "address": "12 MG Road, Bengaluru 560001",
            "items": [{ "product_id": product, "quantity": quantity, "price": "1.00" }],
        })
    }

    /// Checkout body paying for `quantity` units at 10.00 through a gateway
    /// order started for the matching amount.
    async fn paid_checkout(state: &TestState, product: &str, quantity: i64) -> Value {
        let remote = state
            .orders()
            .prepare_payment(Decimal::new(1000 * quantity, 2), None)
            .await
            .unwrap();
        let verifier = SignatureVerifier::new(SecretString::from(KEY_SECRET));
        let mut body = checkout(product, quantity);
        body["payment"] = json!({
            "razorpay_order_id": remote.id,
            "razorpay_payment_id": "pay_B",
            "razorpay_signature": verifier.sign(&remote.id, "pay_B").unwrap(),
        });
        body
    }

    #[tokio::test]
    async fn test_guest_checkout_uses_catalog_price() {
        let (state, store, _) = state();
        let product = seed_product(&state, 5).await;

        let (status, order) = send(
            &state,
            None,
            Method::POST,
            "/api/orders",
            Some(paid_checkout(&state, &product, 2).await),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "PENDING");
        assert_eq!(order["total"], "20.00");
        assert_eq!(order["payment_verified"], true);

        let id = product.parse().unwrap();
        assert_eq!(store.product(id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_counts() {
        let (state, store, _) = state();
        let product = seed_product(&state, 1).await;

        let (status, body) = send(
            &state,
            None,
            Method::POST,
            "/api/orders",
            Some(checkout(&product, 2)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "insufficient_stock");
        assert_eq!(body["available"], 1);
        assert_eq!(body["requested"], 2);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_tampered_signature_is_rejected() {
        let (state, store, _) = state();
        let product = seed_product(&state, 5).await;
        let mut body = paid_checkout(&state, &product, 1).await;
        body["payment"]["razorpay_signature"] = json!("00ff");

        let (status, _) = send(&state, None, Method::POST, "/api/orders", Some(body)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_tracking_hides_contact_details() {
        let (state, _, _) = state();
        let product = seed_product(&state, 5).await;
        let (_, order) = send(
            &state,
            None,
            Method::POST,
            "/api/orders",
            Some(checkout(&product, 1)),
        )
        .await;

        let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());
        let (status, tracked) = send(&state, None, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tracked["status"], "PENDING");
        assert!(tracked.get("customer_email").is_none());
        assert!(tracked.get("address").is_none());
    }

    #[tokio::test]
    async fn test_cancel_refunds_and_restores_stock() {
        let (state, store, gateway) = state();
        let product = seed_product(&state, 5).await;
        let user = store.add_user(Some("Asha Rao"), "asha@example.com").await;
        let customer = Some(Principal::customer(user.id));

        let (_, order) = send(
            &state,
            customer,
            Method::POST,
            "/api/orders",
            Some(paid_checkout(&state, &product, 2).await),
        )
        .await;
        let uri = format!("/api/orders/{}/cancel", order["id"].as_str().unwrap());

        let (status, cancelled) = send(&state, customer, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "CANCELLED");
        assert_eq!(gateway.refunds().len(), 1);
        assert_eq!(store.product(product.parse().unwrap()).await.unwrap().stock, 5);

        let (status, body) = send(&state, customer, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_state");
        assert_eq!(gateway.refunds().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_by_stranger_is_forbidden() {
        let (state, store, _) = state();
        let product = seed_product(&state, 5).await;
        let owner = store.add_user(None, "owner@example.com").await;

        let (_, order) = send(
            &state,
            Some(Principal::customer(owner.id)),
            Method::POST,
            "/api/orders",
            Some(checkout(&product, 1)),
        )
        .await;
        let uri = format!("/api/orders/{}/cancel", order["id"].as_str().unwrap());

        let stranger = Some(Principal::customer(UserId::generate()));
        let (status, _) = send(&state, stranger, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&state, None, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_account_orders_lists_only_own() {
        let (state, store, _) = state();
        let product = seed_product(&state, 10).await;
        let user = store.add_user(Some("Asha Rao"), "asha@example.com").await;
        let customer = Some(Principal::customer(user.id));

        send(&state, customer, Method::POST, "/api/orders", Some(checkout(&product, 1))).await;
        send(&state, None, Method::POST, "/api/orders", Some(checkout(&product, 1))).await;

        let (status, orders) = send(&state, customer, Method::GET, "/api/account/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orders.as_array().unwrap().len(), 1);
    }
}
