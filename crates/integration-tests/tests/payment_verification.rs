//! Payment verification: signatures, idempotency, gateway outages.

use driftwood_core::{AddressId, OrderStatus, UserId};
use driftwood_integration_tests::TestContext;
use driftwood_orders::OrderError;
use driftwood_orders::gateway::MockGateway;

#[tokio::test]
async fn test_gateway_outage_fails_checkout_cleanly() {
    let ctx = TestContext::new();
    ctx.gateway.fail_next_intent();

    let err = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect_err("intent creation failed");
    assert!(matches!(err, OrderError::Gateway(_)));

    // No half-created order is left behind.
    let orders = ctx
        .orders
        .list_orders_for_user(UserId::new(1))
        .await
        .expect("list");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_verification_is_idempotent() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");

    let signature = MockGateway::valid_signature(&summary.gateway_intent_id, "pay_1");
    let first = ctx
        .orders
        .verify_payment(summary.order_id, "pay_1", &signature)
        .await
        .expect("first confirmation");
    let second = ctx
        .orders
        .verify_payment(summary.order_id, "pay_1", &signature)
        .await
        .expect("re-delivered confirmation");

    assert_eq!(first.status, OrderStatus::Paid);
    assert_eq!(second.status, OrderStatus::Paid);
    // The second delivery did not write anything.
    assert_eq!(first.version, second.version);

    let history = ctx
        .orders
        .status_history(summary.order_id)
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_invalid_signature_cancels_order() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");

    let err = ctx
        .orders
        .verify_payment(summary.order_id, "pay_1", "deadbeef")
        .await
        .expect_err("forged signature");
    assert!(matches!(err, OrderError::PaymentVerification(_)));

    let order = ctx
        .orders
        .get_order(summary.order_id)
        .await
        .expect("order still exists");
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_signature_is_bound_to_the_intent() {
    let ctx = TestContext::new();
    let first = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("first checkout");
    let second = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("second checkout");

    // A confirmation minted for the first intent must not pay the second
    // order.
    let signature = MockGateway::valid_signature(&first.gateway_intent_id, "pay_1");
    let err = ctx
        .orders
        .verify_payment(second.order_id, "pay_1", &signature)
        .await
        .expect_err("replayed confirmation");
    assert!(matches!(err, OrderError::PaymentVerification(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_verify_and_cancel_one_wins() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");
    let signature = MockGateway::valid_signature(&summary.gateway_intent_id, "pay_1");

    // The gateway confirmation and the customer's cancel race through the
    // service; the version guard lets exactly one of them land.
    let (verified, cancelled) = tokio::join!(
        ctx.orders.verify_payment(summary.order_id, "pay_1", &signature),
        ctx.orders.cancel_order(summary.order_id, "customer:1"),
    );
    assert!(
        verified.is_ok() != cancelled.is_ok(),
        "exactly one writer must win: verify={verified:?} cancel={cancelled:?}"
    );

    let order = ctx.orders.get_order(summary.order_id).await.expect("order");
    if verified.is_ok() {
        assert_eq!(order.status, OrderStatus::Paid);
    } else {
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(matches!(
            verified.expect_err("loser"),
            OrderError::InvalidState {
                current: OrderStatus::Cancelled
            }
        ));
    }

    // One creation row plus the single winning transition.
    let history = ctx
        .orders
        .status_history(summary.order_id)
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_verification_after_cancel_rejected() {
    let ctx = TestContext::new();
    let summary = ctx
        .orders
        .create_order(UserId::new(1), TestContext::sample_cart(), AddressId::new(10))
        .await
        .expect("checkout succeeds");
    ctx.orders
        .cancel_order(summary.order_id, "customer:1")
        .await
        .expect("cancel");

    let signature = MockGateway::valid_signature(&summary.gateway_intent_id, "pay_1");
    let err = ctx
        .orders
        .verify_payment(summary.order_id, "pay_1", &signature)
        .await
        .expect_err("cancelled order");
    assert!(matches!(
        err,
        OrderError::InvalidState {
            current: OrderStatus::Cancelled
        }
    ));
}
