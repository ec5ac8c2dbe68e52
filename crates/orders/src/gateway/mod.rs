//! Payment gateway adapter.
//!
//! The gateway holds no Driftwood state. `create_intent` and `issue_refund`
//! are network calls with bounded timeouts; `verify_signature` is a pure
//! cryptographic check and must not mutate anything - all state changes
//! happen in the services after a successful verification.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use driftwood_core::CurrencyCode;
use rust_decimal::Decimal;
use thiserror::Error;

pub use http::{HttpPaymentGateway, PaymentGatewayConfig};
pub use mock::MockGateway;

/// Errors from the payment gateway adapter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never completed (connect error, bounded timeout hit).
    /// Retryable.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with something we could not decode.
    #[error("gateway response invalid: {0}")]
    Response(String),

    /// The gateway rejected the call.
    #[error("gateway rejected the call: {0}")]
    Api(String),
}

impl GatewayError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// Capability set of the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount` in `currency`, returning the
    /// gateway-side intent id.
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<String, GatewayError>;

    /// Check that `signature` proves the gateway confirmed payment
    /// `payment_id` against intent `intent_id`. Pure; no side effects.
    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Issue a refund of `amount` against `payment_id`.
    ///
    /// `idempotency_key` must be deterministic per order so a retried call
    /// after a partial failure never refunds twice.
    async fn issue_refund(
        &self,
        payment_id: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<String, GatewayError>;

    /// Publishable key the client SDK needs to confirm intents.
    fn publishable_key(&self) -> &str;
}

/// Deterministic gateway idempotency key for refunds of one order.
///
/// Derived from the order id only, so every retry of the same approval
/// carries the same key.
#[must_use]
pub fn refund_idempotency_key(order_id: driftwood_core::OrderId) -> String {
    format!("refund-{order_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwood_core::OrderId;

    #[test]
    fn test_refund_idempotency_key_is_deterministic() {
        let id = OrderId::generate();
        assert_eq!(refund_idempotency_key(id), refund_idempotency_key(id));
    }

    #[test]
    fn test_refund_idempotency_keys_differ_per_order() {
        assert_ne!(
            refund_idempotency_key(OrderId::generate()),
            refund_idempotency_key(OrderId::generate())
        );
    }

    #[test]
    fn test_only_request_errors_are_retryable() {
        assert!(GatewayError::Request("timeout".into()).is_retryable());
        assert!(!GatewayError::Response("bad json".into()).is_retryable());
        assert!(!GatewayError::Api("card declined".into()).is_retryable());
    }
}
