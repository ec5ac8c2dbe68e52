//! Full order lifecycle: checkout through delivery.

use driftwood_core::{AddressId, OrderStatus, UserId};
use driftwood_integration_tests::TestContext;
use driftwood_orders::OrderError;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_checkout_computes_total_once() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");

    // 100 * 2 + 50 * 1
    assert_eq!(summary.amount_total, Decimal::from(250));
    assert!(!summary.gateway_intent_id.is_empty());

    let order = ctx
        .orders
        .get_order(summary.order_id)
        .await
        .expect("order persisted");
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.amount_total, Decimal::from(250));
    assert!(order.gateway_payment_id.is_none());
}

#[tokio::test]
async fn test_empty_cart_rejected_before_gateway() {
    let ctx = TestContext::new();
    let err = ctx
        .orders
        .create_order(UserId::new(1), Vec::new(), AddressId::new(10))
        .await
        .expect_err("empty cart");
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(ctx.gateway.intents_created(), 0);
}

#[tokio::test]
async fn test_happy_path_to_delivered() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.gateway_payment_id.is_some());

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let order = ctx
            .orders
            .update_status(order.id, status, "admin:ops")
            .await
            .expect("fulfilment transition");
        assert_eq!(order.status, status);
    }

    // Delivered is refund-eligible but otherwise terminal.
    let err = ctx
        .orders
        .update_status(order.id, OrderStatus::Cancelled, "admin:ops")
        .await
        .expect_err("delivered orders cannot be cancelled");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_skipping_a_fulfilment_step_rejected() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;

    let err = ctx
        .orders
        .update_status(order.id, OrderStatus::Delivered, "admin:ops")
        .await
        .expect_err("paid -> delivered skips two steps");
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Delivered,
        }
    ));
}

#[tokio::test]
async fn test_admin_cannot_set_payment_or_refund_statuses() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;

    for reserved in [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::RefundRequested,
        OrderStatus::Refunded,
    ] {
        let err = ctx
            .orders
            .update_status(order.id, reserved, "admin:ops")
            .await
            .expect_err("reserved status");
        assert!(
            matches!(
                err,
                OrderError::InvalidState { .. } | OrderError::InvalidTransition { .. }
            ),
            "expected rejection for {reserved}",
        );
    }
}

#[tokio::test]
async fn test_cancel_only_while_pending() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");

    let cancelled = ctx
        .orders
        .cancel_order(summary.order_id, "customer:1")
        .await
        .expect("pending orders can be cancelled");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let paid = ctx.paid_order(UserId::new(1)).await;
    let err = ctx
        .orders
        .cancel_order(paid.id, "customer:1")
        .await
        .expect_err("paid orders need a refund instead");
    assert!(matches!(err, OrderError::InvalidState { .. }));
}

#[tokio::test]
async fn test_history_records_every_transition() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;
    ctx.orders
        .update_status(order.id, OrderStatus::Confirmed, "admin:ops")
        .await
        .expect("confirm");

    let history = ctx
        .orders
        .status_history(order.id)
        .await
        .expect("history readable");

    let steps: Vec<(Option<OrderStatus>, OrderStatus)> =
        history.iter().map(|c| (c.from, c.to)).collect();
    assert_eq!(
        steps,
        vec![
            (None, OrderStatus::PendingPayment),
            (Some(OrderStatus::PendingPayment), OrderStatus::Paid),
            (Some(OrderStatus::Paid), OrderStatus::Confirmed),
        ]
    );
    assert_eq!(history[1].actor, "gateway");
    assert_eq!(history[2].actor, "admin:ops");
}

#[tokio::test]
async fn test_listing_is_scoped_to_owner() {
    let ctx = TestContext::new();
    ctx.paid_order(UserId::new(1)).await;
    ctx.paid_order(UserId::new(1)).await;
    ctx.paid_order(UserId::new(2)).await;

    let mine = ctx
        .orders
        .list_orders_for_user(UserId::new(1))
        .await
        .expect("list");
    assert_eq!(mine.len(), 2);

    let all = ctx.orders.list_orders(100).await.expect("admin list");
    assert_eq!(all.len(), 3);
}
