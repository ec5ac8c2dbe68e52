//! Programmable in-process gateway for tests and local development.
//!
//! Mirrors the gateway contract closely enough to exercise every service
//! path: deterministic signatures, scriptable failures, and gateway-side
//! refund idempotency (repeated keys do not execute twice).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use driftwood_core::CurrencyCode;

use super::http::sign_confirmation;
use super::{GatewayError, PaymentGateway};

const MOCK_SIGNING_SECRET: &str = "mock-gateway-signing-secret";

/// In-process payment gateway double.
#[derive(Debug, Default)]
pub struct MockGateway {
    intents_created: AtomicUsize,
    fail_next_intent: AtomicBool,
    fail_next_refund: AtomicBool,
    /// Refunds executed, keyed by idempotency key.
    refunds: Mutex<HashMap<String, String>>,
}

impl MockGateway {
    /// Create a mock gateway that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_intent` call fail with a retryable error.
    pub fn fail_next_intent(&self) {
        self.fail_next_intent.store(true, Ordering::SeqCst);
    }

    /// Make the next `issue_refund` call fail as if the request timed out.
    ///
    /// The refund is still recorded under its idempotency key, modelling a
    /// gateway that executed the refund but whose response was lost.
    pub fn fail_next_refund(&self) {
        self.fail_next_refund.store(true, Ordering::SeqCst);
    }

    /// A signature the gateway would produce for this intent/payment pair.
    #[must_use]
    pub fn valid_signature(intent_id: &str, payment_id: &str) -> String {
        sign_confirmation(MOCK_SIGNING_SECRET, intent_id, payment_id)
    }

    /// Number of intents created so far.
    #[must_use]
    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    /// Number of refunds actually executed (distinct idempotency keys).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn refunds_executed(&self) -> usize {
        self.refunds.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        _amount: Decimal,
        _currency: CurrencyCode,
    ) -> Result<String, GatewayError> {
        if self.fail_next_intent.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Request("simulated timeout".to_owned()));
        }
        let n = self.intents_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("pi_mock_{n}"))
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        Self::valid_signature(intent_id, payment_id) == signature
    }

    async fn issue_refund(
        &self,
        _payment_id: &str,
        _amount: Decimal,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let refund_id = {
            let mut refunds = self.refunds.lock().expect("mock lock poisoned");
            let next = refunds.len() + 1;
            refunds
                .entry(idempotency_key.to_owned())
                .or_insert_with(|| format!("re_mock_{next}"))
                .clone()
        };

        if self.fail_next_refund.swap(false, Ordering::SeqCst) {
            // The refund executed but the caller never saw the response.
            return Err(GatewayError::Request("simulated timeout".to_owned()));
        }

        Ok(refund_id)
    }

    fn publishable_key(&self) -> &str {
        "pk_mock"
    }
}
