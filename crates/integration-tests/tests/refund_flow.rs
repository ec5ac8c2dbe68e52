//! Refund lifecycle across the customer and admin surfaces.

use driftwood_core::{OrderStatus, RefundStatus, UserId};
use driftwood_integration_tests::TestContext;
use driftwood_orders::{OrderError, RefundDecision};

#[tokio::test]
async fn test_approved_refund_reaches_refunded() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;

    let request = ctx
        .refunds
        .create_refund_request(order.id, UserId::new(1), "wrong size")
        .await
        .expect("request opened");

    let resolved = ctx
        .refunds
        .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
        .await
        .expect("approved");
    assert_eq!(resolved.status, RefundStatus::Completed);

    let order = ctx.orders.get_order(order.id).await.expect("order");
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(ctx.gateway.refunds_executed(), 1);

    // Refunded is terminal for everyone.
    let err = ctx
        .orders
        .update_status(order.id, OrderStatus::Confirmed, "admin:jane")
        .await
        .expect_err("terminal order");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_rejection_restores_the_exact_prior_status() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;
    ctx.orders
        .update_status(order.id, OrderStatus::Confirmed, "admin:jane")
        .await
        .expect("confirm");
    ctx.orders
        .update_status(order.id, OrderStatus::Shipped, "admin:jane")
        .await
        .expect("ship");

    let request = ctx
        .refunds
        .create_refund_request(order.id, UserId::new(1), "changed my mind")
        .await
        .expect("request opened");

    // While under review the order is frozen for fulfilment.
    let err = ctx
        .orders
        .update_status(order.id, OrderStatus::Delivered, "admin:jane")
        .await
        .expect_err("frozen under refund review");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    ctx.refunds
        .resolve(
            request.id,
            RefundDecision::Reject,
            Some("outside the return window"),
            "admin:jane",
        )
        .await
        .expect("rejected");

    let order = ctx.orders.get_order(order.id).await.expect("order");
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(ctx.gateway.refunds_executed(), 0);

    // Fulfilment resumes where it stopped.
    let order = ctx
        .orders
        .update_status(order.id, OrderStatus::Delivered, "admin:jane")
        .await
        .expect("deliver after rejection");
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_one_open_request_per_order() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;

    ctx.refunds
        .create_refund_request(order.id, UserId::new(1), "first")
        .await
        .expect("first request");
    let err = ctx
        .refunds
        .create_refund_request(order.id, UserId::new(1), "second")
        .await
        .expect_err("second open request");
    assert!(matches!(err, OrderError::DuplicateRequest));
}

#[tokio::test]
async fn test_gateway_failure_keeps_request_open_and_retry_is_safe() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;
    let request = ctx
        .refunds
        .create_refund_request(order.id, UserId::new(1), "damaged")
        .await
        .expect("request opened");

    // The gateway executes the refund but the response is lost.
    ctx.gateway.fail_next_refund();
    let err = ctx
        .refunds
        .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
        .await
        .expect_err("gateway timeout");
    assert!(matches!(err, OrderError::RefundGateway(_)));

    // Nothing moved locally.
    let order_state = ctx.orders.get_order(order.id).await.expect("order");
    assert_eq!(order_state.status, OrderStatus::RefundRequested);

    // The retry completes and the idempotency key prevents a second
    // gateway refund.
    let resolved = ctx
        .refunds
        .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
        .await
        .expect("retry");
    assert_eq!(resolved.status, RefundStatus::Completed);
    assert_eq!(ctx.gateway.refunds_executed(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_approve_and_reject_resolve_once() {
    let ctx = TestContext::new();
    let order = ctx.paid_order(UserId::new(1)).await;
    let request = ctx
        .refunds
        .create_refund_request(order.id, UserId::new(1), "damaged")
        .await
        .expect("request opened");

    // Two admins act on the same request at once; the order's version
    // guard serializes them and only one resolution is recorded.
    let (approved, rejected) = tokio::join!(
        ctx.refunds
            .resolve(request.id, RefundDecision::Approve, None, "admin:jane"),
        ctx.refunds
            .resolve(request.id, RefundDecision::Reject, None, "admin:kim"),
    );
    assert!(
        approved.is_ok() != rejected.is_ok(),
        "exactly one resolver must win: approve={approved:?} reject={rejected:?}"
    );

    let order_state = ctx.orders.get_order(order.id).await.expect("order");
    let request_state = ctx
        .refunds
        .get_refund_request(request.id)
        .await
        .expect("request");
    if approved.is_ok() {
        assert_eq!(order_state.status, OrderStatus::Refunded);
        assert_eq!(request_state.status, RefundStatus::Completed);
        assert_eq!(ctx.gateway.refunds_executed(), 1);
    } else {
        assert_eq!(order_state.status, OrderStatus::Paid);
        assert_eq!(request_state.status, RefundStatus::Rejected);
        // The losing approval may have reached the gateway before the
        // rejection landed; it must not have refunded more than once.
        assert!(ctx.gateway.refunds_executed() <= 1);
    }
}

#[tokio::test]
async fn test_refund_visibility_is_scoped_to_owner() {
    let ctx = TestContext::new();
    let mine = ctx.paid_order(UserId::new(1)).await;
    let theirs = ctx.paid_order(UserId::new(2)).await;

    ctx.refunds
        .create_refund_request(mine.id, UserId::new(1), "mine")
        .await
        .expect("own order");
    let err = ctx
        .refunds
        .create_refund_request(theirs.id, UserId::new(1), "not mine")
        .await
        .expect_err("someone else's order");
    assert!(matches!(err, OrderError::NotFound));

    let listed = ctx
        .refunds
        .list_for_user(UserId::new(1))
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}
