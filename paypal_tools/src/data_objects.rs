use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response to creating a checkout order. The buyer approves `id` in their browser before capture.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreated {
    pub id: String,
    pub status: String,
}

/// Result of capturing an approved checkout order.
#[derive(Debug, Clone)]
pub struct CaptureResponse {
    pub status: String,
    /// Id of the first capture in the response, when present. This is the reference PayPal uses in subsequent
    /// webhook notifications.
    pub capture_id: Option<String>,
    pub raw: Value,
}

impl CaptureResponse {
    pub fn from_value(raw: Value) -> Self {
        let status = raw["status"].as_str().unwrap_or_default().to_string();
        let capture_id = raw["purchase_units"][0]["payments"]["captures"][0]["id"].as_str().map(String::from);
        Self { status, capture_id, raw }
    }
}

/// The transmission headers PayPal attaches to every webhook delivery, echoed back to the verification endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSignature {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}
