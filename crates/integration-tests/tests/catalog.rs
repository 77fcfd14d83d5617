//! Product deletion guard.

#![allow(clippy::unwrap_used)]

use apothecary_core::OrderStatus;
use apothecary_integration_tests::{TestContext, checkout};
use apothecary_storefront::services::CommerceError;

#[tokio::test]
async fn delete_blocked_then_allowed() {
    let ctx = TestContext::new();
    let product = ctx.product("Ashwagandha", "9.00", 10).await;
    let orders = ctx.state.orders();

    let first = orders
        .create_order(None, checkout(&[(product, 1)], None))
        .await
        .unwrap();
    let second = orders
        .create_order(None, checkout(&[(product, 1)], None))
        .await
        .unwrap();
    orders
        .update_order_status(second.id, OrderStatus::Shipped)
        .await
        .unwrap();

    let err = ctx.state.catalog().delete_product(product).await.unwrap_err();
    match err {
        CommerceError::Conflict {
            message,
            mut blocking_statuses,
        } => {
            blocking_statuses.sort_by_key(|s| s.as_str());
            assert_eq!(blocking_statuses, [OrderStatus::Pending, OrderStatus::Shipped]);
            assert!(message.contains("2 order(s)"));
        }
        other => panic!("expected conflict, got {other}"),
    }

    orders
        .update_order_status(first.id, OrderStatus::Delivered)
        .await
        .unwrap();
    orders
        .update_order_status(second.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let images = ctx.state.catalog().delete_product(product).await.unwrap();
    assert_eq!(images, ["ashwagandha.jpg"]);
    assert!(ctx.store.product(product).await.is_none());

    // Order lines keep their snapshot after the product is gone
    let kept = ctx.store.order(first.id).await.unwrap();
    assert_eq!(kept.items[0].product_name, "Ashwagandha");
    assert_eq!(kept.items[0].product_id, None);
}
