//! HTTP payment gateway adapter.
//!
//! Talks to the external payment processor's REST API with a bounded
//! request timeout. Signature verification never leaves the process: it is
//! an HMAC-SHA256 over `"{intent_id}:{payment_id}"` under the shared
//! signing secret, compared in constant time.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument};
use url::Url;

use driftwood_core::CurrencyCode;

use super::{GatewayError, PaymentGateway};

/// Bounded timeout for gateway calls. Exceeding it fails fast with a
/// retryable error and leaves no partial local state behind.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the payment gateway.
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    /// Gateway API base URL.
    pub base_url: Url,
    /// Server-side API key.
    pub secret_key: SecretString,
    /// Shared secret for callback signature verification.
    pub signing_secret: SecretString,
    /// Key the client SDK uses; safe to expose in the browser.
    pub publishable_key: String,
}

impl std::fmt::Debug for PaymentGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("secret_key", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .finish()
    }
}

/// Payment gateway adapter over the processor's REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    config: PaymentGatewayConfig,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

impl HttpPaymentGateway {
    /// Create a new gateway adapter.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Request` if the HTTP client cannot be built.
    pub fn new(config: PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Request(format!("invalid endpoint {path}: {e}")))
    }

    /// Expected signature for a payment confirmation.
    fn expected_mac(&self, intent_id: &str, payment_id: &str) -> Hmac<Sha256> {
        let mut mac = Hmac::<Sha256>::new_from_slice(
            self.config.signing_secret.expose_secret().as_bytes(),
        )
        .expect("HMAC accepts keys of any length");
        mac.update(format!("{intent_id}:{payment_id}").as_bytes());
        mac
    }

    async fn decode_or_api_error<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Response(e.to_string()));
        }

        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(GatewayError::Api(message))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(%amount, %currency))]
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("v1/intents")?)
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(&serde_json::json!({
                "amount": amount,
                "currency": currency.code(),
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let intent: IntentResponse = Self::decode_or_api_error(response).await?;
        debug!(intent_id = %intent.id, "payment intent created");
        Ok(intent.id)
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        // verify_slice is constant-time
        self.expected_mac(intent_id, payment_id)
            .verify_slice(&provided)
            .is_ok()
    }

    #[instrument(skip(self, payment_id), fields(%amount, idempotency_key))]
    async fn issue_refund(
        &self,
        payment_id: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("v1/refunds")?)
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .json(&serde_json::json!({
                "payment_id": payment_id,
                "amount": amount,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let refund: RefundResponse = Self::decode_or_api_error(response).await?;
        debug!(refund_id = %refund.id, "gateway refund issued");
        Ok(refund.id)
    }

    fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }
}

/// Compute the hex signature the gateway would attach to a confirmation.
///
/// Exposed for tests and for local tooling that simulates the gateway.
#[must_use]
pub fn sign_confirmation(signing_secret: &str, intent_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{intent_id}:{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
