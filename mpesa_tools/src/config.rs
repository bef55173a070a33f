use kps_common::Secret;
use log::*;

pub const DARAJA_SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";
/// The public Daraja sandbox shortcode.
pub const SANDBOX_SHORTCODE: &str = "174379";

#[derive(Debug, Clone, Default)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    pub shortcode: String,
    pub passkey: Secret<String>,
    pub callback_url: String,
    /// Shared secret appended to the callback URL as a query token. Daraja does not sign callbacks, so this is
    /// the only thing authenticating them. When empty, the server accepts callbacks unauthenticated.
    pub callback_token: Secret<String>,
}

impl MpesaConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("MPESA_BASE_URL").unwrap_or_else(|_| {
            warn!("📱️ MPESA_BASE_URL not set, using the Daraja sandbox");
            DARAJA_SANDBOX_URL.to_string()
        });
        let consumer_key = std::env::var("MPESA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("📱️ MPESA_CONSUMER_KEY not set. STK pushes will be mocked.");
            String::new()
        });
        let consumer_secret = Secret::new(std::env::var("MPESA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("📱️ MPESA_CONSUMER_SECRET not set. STK pushes will be mocked.");
            String::new()
        }));
        let shortcode = std::env::var("MPESA_SHORTCODE").unwrap_or_else(|_| {
            warn!("📱️ MPESA_SHORTCODE not set, using the sandbox shortcode");
            SANDBOX_SHORTCODE.to_string()
        });
        let passkey = Secret::new(std::env::var("MPESA_PASSKEY").unwrap_or_else(|_| {
            warn!("📱️ MPESA_PASSKEY not set. STK pushes will be mocked.");
            String::new()
        }));
        let callback_url = std::env::var("MPESA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("📱️ MPESA_CALLBACK_URL not set. Daraja will have nowhere to deliver results.");
            String::new()
        });
        let callback_token = Secret::new(std::env::var("MPESA_CALLBACK_TOKEN").unwrap_or_else(|_| {
            warn!("📱️ MPESA_CALLBACK_TOKEN not set. Callbacks will be accepted without authentication.");
            String::new()
        }));
        Self { base_url, consumer_key, consumer_secret, shortcode, passkey, callback_url, callback_token }
    }

    /// True when live Daraja calls can be made.
    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.reveal().is_empty() && !self.passkey.reveal().is_empty()
    }

    /// The callback URL with the authentication token appended.
    pub fn callback_url_with_token(&self) -> String {
        format!("{}?token={}", self.callback_url, self.callback_token.reveal())
    }
}
