use kps_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider credentials are missing from the environment. Surfaced to clients as a server configuration
    /// problem, never as a client error.
    #[error("{0} is not configured on this server")]
    NotConfigured(String),
    #[error("Upstream provider error: {0}")]
    Upstream(String),
}

/// Result of capturing a redirect-provider checkout session.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Provider-reported status, e.g. `COMPLETED`.
    pub status: String,
    /// The capture id, when the provider issued one.
    pub capture_id: Option<String>,
    /// The raw provider response, recorded in the audit trail.
    pub raw: Value,
}

impl CaptureOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// The signature transmission headers accompanying a redirect-provider webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSignature {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

/// A redirect-rail payment provider (PayPal). The buyer approves the payment in their browser; the server creates
/// the checkout session up front and captures it once approved.
#[allow(async_fn_in_trait)]
pub trait RedirectProvider {
    /// Creates a checkout session for the given amount and returns the provider's order id.
    async fn create_order(&self, total: Cents, currency: &str) -> Result<String, ProviderError>;

    /// Captures an approved checkout session.
    async fn capture_order(&self, provider_order_id: &str) -> Result<CaptureOutcome, ProviderError>;

    /// Verifies a webhook delivery against the provider's verification endpoint. `Ok(false)` means the provider
    /// answered and rejected the signature.
    async fn verify_webhook_signature(
        &self,
        signature: &WebhookSignature,
        event: &Value,
    ) -> Result<bool, ProviderError>;
}

/// A push request for the push rail: prompt `phone` to pay `amount` for order `reference`.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Normalized MSISDN, e.g. `254712345678`.
    pub phone: String,
    pub amount: Cents,
    pub reference: String,
    pub description: String,
}

/// Result of initiating a push payment.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub customer_message: Option<String>,
    /// True when the provider is unconfigured and the outcome was simulated. Lets dev environments exercise the
    /// full flow without Daraja credentials.
    pub mock: bool,
    pub raw: Value,
}

/// A push-rail payment provider (M-Pesa STK push). The server prompts the buyer's phone and learns the outcome
/// from an asynchronous callback.
#[allow(async_fn_in_trait)]
pub trait PushProvider {
    async fn initiate_push(&self, request: PushRequest) -> Result<PushOutcome, ProviderError>;
}
