//! Integration tests for Driftwood.
//!
//! These tests exercise the full order and refund lifecycles through
//! `OrderService` and `RefundService` against the in-memory stores and
//! the mock gateway, crossing the storefront/admin boundary the way the
//! two binaries do in production.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p driftwood-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use rust_decimal::Decimal;

use driftwood_core::{AddressId, CurrencyCode, LineItem, ProductId, UserId};
use driftwood_orders::gateway::MockGateway;
use driftwood_orders::repository::{InMemoryOrderStore, InMemoryRefundStore};
use driftwood_orders::{Order, OrderService, RefundService};

/// Everything a lifecycle test needs, wired the way the binaries wire it.
pub struct TestContext {
    /// Customer/admin order operations.
    pub orders: OrderService,
    /// Refund request operations.
    pub refunds: RefundService,
    /// Scriptable gateway double.
    pub gateway: Arc<MockGateway>,
}

impl TestContext {
    /// Fresh context with empty stores and a well-behaved gateway.
    #[must_use]
    pub fn new() -> Self {
        let order_store = Arc::new(InMemoryOrderStore::new());
        let refund_store = Arc::new(InMemoryRefundStore::new());
        let gateway = Arc::new(MockGateway::new());

        Self {
            orders: OrderService::new(order_store.clone(), gateway.clone(), CurrencyCode::USD),
            refunds: RefundService::new(order_store, refund_store, gateway.clone()),
            gateway,
        }
    }

    /// A two-line cart totalling 250 USD.
    #[must_use]
    pub fn sample_cart() -> Vec<LineItem> {
        vec![
            LineItem::new(ProductId::new(1), Decimal::from(100), 2),
            LineItem::new(ProductId::new(2), Decimal::from(50), 1),
        ]
    }

    /// Check out and verify payment for `user`, returning the paid order.
    ///
    /// # Panics
    ///
    /// Panics if checkout or verification fails.
    pub async fn paid_order(&self, user: UserId) -> Order {
        let summary = self
            .orders
            .create_order(user, Self::sample_cart(), AddressId::new(10))
            .await
            .expect("checkout succeeds");

        let payment_id = format!("pay_{}", summary.order_id);
        let signature = MockGateway::valid_signature(&summary.gateway_intent_id, &payment_id);
        self.orders
            .verify_payment(summary.order_id, &payment_id, &signature)
            .await
            .expect("payment verification succeeds")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
