//! Order creation: stock reservation, pricing and payment verification.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;
use tokio::task::JoinSet;

use apothecary_core::OrderStatus;
use apothecary_integration_tests::{TestContext, checkout, paid, verifier};
use apothecary_storefront::services::CommerceError;

#[tokio::test]
async fn concurrent_orders_never_oversell() {
    let ctx = TestContext::new();
    let product = ctx.product("Vitamin C", "12.50", 5).await;

    let mut tasks = JoinSet::new();
    for _ in 0..12 {
        let state = ctx.state.clone();
        let checkout = checkout(&[(product, 1)], None);
        tasks.spawn(async move { state.orders().create_order(None, checkout).await });
    }

    let mut placed = 0;
    let mut refused = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(CommerceError::Stock { available, .. }) => {
                assert_eq!(available, 0);
                refused += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(refused, 7);
    assert_eq!(ctx.stock(product).await, 0);
    assert_eq!(ctx.store.order_count().await, 5);
}

#[tokio::test]
async fn create_is_all_or_nothing() {
    let ctx = TestContext::new();
    let plenty = ctx.product("Zinc", "5.00", 10).await;
    let scarce = ctx.product("Magnesium", "7.00", 1).await;

    let err = ctx
        .state
        .orders()
        .create_order(None, checkout(&[(plenty, 3), (scarce, 2)], None))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Stock { available: 1, requested: 2, .. }));
    assert_eq!(ctx.stock(plenty).await, 10);
    assert_eq!(ctx.stock(scarce).await, 1);
    assert_eq!(ctx.store.order_count().await, 0);
}

#[tokio::test]
async fn last_unit_can_be_bought_once() {
    let ctx = TestContext::new();
    let product = ctx.product("Ashwagandha", "9.00", 1).await;
    let orders = ctx.state.orders();

    let order = orders
        .create_order(None, checkout(&[(product, 1)], None))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(ctx.stock(product).await, 0);

    let err = orders
        .create_order(None, checkout(&[(product, 1)], None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Stock { available: 0, requested: 1, .. }));
}

#[tokio::test]
async fn total_matches_gateway_amount() {
    let ctx = TestContext::new();
    let product = ctx.product("Vitamin D3", "10.00", 5).await;

    let payment = ctx.pay("20.00", "pay_B").await;
    assert_eq!(ctx.gateway.created_orders()[0].amount, 2000);

    let order = ctx
        .state
        .orders()
        .create_order(None, checkout(&[(product, 2)], Some(payment)))
        .await
        .unwrap();
    assert_eq!(order.total, Decimal::from_str("20.00").unwrap());
    assert!(order.payment.payment_verified);
}

#[tokio::test]
async fn one_payment_settles_one_order() {
    let ctx = TestContext::new();
    let product = ctx.product("Moringa", "10.00", 5).await;
    let orders = ctx.state.orders();
    let payment = ctx.pay("10.00", "pay_once").await;

    orders
        .create_order(None, checkout(&[(product, 1)], Some(payment.clone())))
        .await
        .unwrap();
    let err = orders
        .create_order(None, checkout(&[(product, 1)], Some(payment)))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Payment(_)));
    assert_eq!(ctx.store.order_count().await, 1);
    assert_eq!(ctx.stock(product).await, 4);
}

#[tokio::test]
async fn small_payment_cannot_cover_large_order() {
    let ctx = TestContext::new();
    let product = ctx.product("Chyawanprash", "500.00", 2).await;
    let payment = ctx.pay("10.00", "pay_small").await;

    let err = ctx
        .state
        .orders()
        .create_order(None, checkout(&[(product, 1)], Some(payment)))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Payment(_)));
    assert_eq!(ctx.store.order_count().await, 0);
    assert_eq!(ctx.stock(product).await, 2);
}

#[tokio::test]
async fn tampered_signature_creates_nothing() {
    let ctx = TestContext::new();
    let product = ctx.product("Triphala", "4.50", 3).await;

    let mut payment = paid("order_A", "pay_B");
    payment.gateway_payment_id = "pay_C".to_owned();

    let err = ctx
        .state
        .orders()
        .create_order(None, checkout(&[(product, 1)], Some(payment)))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Payment(_)));
    assert_eq!(ctx.stock(product).await, 3);
    assert_eq!(ctx.store.order_count().await, 0);
}

#[test]
fn signature_is_deterministic() {
    let verifier = verifier();
    let first = verifier.sign("order_A", "pay_B").unwrap();
    assert_eq!(verifier.sign("order_A", "pay_B").unwrap(), first);
    assert_eq!(first.len(), 64);
    assert!(verifier.verify("order_A", "pay_B", &first));
    assert!(!verifier.verify("order_A", "pay_X", &first));
}
