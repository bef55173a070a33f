use kps_common::Secret;
use log::*;

pub const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone, Default)]
pub struct PaypalConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub webhook_id: String,
}

impl PaypalConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("PAYPAL_BASE_URL").unwrap_or_else(|_| {
            warn!("🅿️ PAYPAL_BASE_URL not set, using the sandbox");
            PAYPAL_SANDBOX_URL.to_string()
        });
        let client_id = std::env::var("PAYPAL_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🅿️ PAYPAL_CLIENT_ID not set. PayPal payments will be unavailable.");
            String::new()
        });
        let client_secret = Secret::new(std::env::var("PAYPAL_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("🅿️ PAYPAL_CLIENT_SECRET not set. PayPal payments will be unavailable.");
            String::new()
        }));
        let webhook_id = std::env::var("PAYPAL_WEBHOOK_ID").unwrap_or_else(|_| {
            warn!("🅿️ PAYPAL_WEBHOOK_ID not set. Webhook signature verification will fail.");
            String::new()
        });
        Self { base_url, client_id, client_secret, webhook_id }
    }

    /// True when both OAuth credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.reveal().is_empty()
    }
}
