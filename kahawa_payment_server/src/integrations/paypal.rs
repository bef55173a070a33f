use kahawa_payment_engine::traits::{CaptureOutcome, ProviderError, RedirectProvider, WebhookSignature};
use kps_common::Cents;
use paypal_tools::{PaypalApi, PaypalApiError, PaypalConfig, WebhookSignature as PaypalSignature};
use serde_json::Value;

/// The redirect rail, backed by the PayPal Orders v2 API.
#[derive(Clone)]
pub struct PaypalGateway {
    api: PaypalApi,
}

impl PaypalGateway {
    pub fn new(config: PaypalConfig) -> Result<Self, PaypalApiError> {
        let api = PaypalApi::new(config)?;
        Ok(Self { api })
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }
}

fn map_err(e: PaypalApiError) -> ProviderError {
    match e {
        PaypalApiError::NotConfigured => ProviderError::NotConfigured("PayPal".to_string()),
        other => ProviderError::Upstream(other.to_string()),
    }
}

impl RedirectProvider for PaypalGateway {
    async fn create_order(&self, total: Cents, currency: &str) -> Result<String, ProviderError> {
        let order = self.api.create_order(total, currency).await.map_err(map_err)?;
        Ok(order.id)
    }

    async fn capture_order(&self, provider_order_id: &str) -> Result<CaptureOutcome, ProviderError> {
        let capture = self.api.capture_order(provider_order_id).await.map_err(map_err)?;
        Ok(CaptureOutcome { status: capture.status, capture_id: capture.capture_id, raw: capture.raw })
    }

    async fn verify_webhook_signature(
        &self,
        signature: &WebhookSignature,
        event: &Value,
    ) -> Result<bool, ProviderError> {
        let sig = PaypalSignature {
            transmission_id: signature.transmission_id.clone(),
            transmission_time: signature.transmission_time.clone(),
            transmission_sig: signature.transmission_sig.clone(),
            cert_url: signature.cert_url.clone(),
            auth_algo: signature.auth_algo.clone(),
        };
        self.api.verify_webhook_signature(&sig, event).await.map_err(map_err)
    }
}
