//! Request and response payloads for the payment routes, and the sanitization applied to every free-text field
//! before it reaches the database.
use kahawa_payment_engine::{
    cart::CartEntry,
    flow::{CheckoutRequest, StkCallback, WebhookNotification},
};
use kps_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ServerError;

pub const MAX_PRODUCT_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 120;
pub const MAX_EMAIL_LEN: usize = 160;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_ADDRESS_LEN: usize = 240;

/// Trims, strips control characters and clamps the length of a client-supplied string. Applied to every free-text
/// field before it is stored.
pub fn sanitize_text(s: &str, max_len: usize) -> String {
    let cleaned: String = s.trim().chars().filter(|c| !c.is_control()).collect();
    cleaned.chars().take(max_len).collect()
}

fn sanitize_opt(s: &Option<String>, max_len: usize) -> Option<String> {
    s.as_deref().map(|s| sanitize_text(s, max_len)).filter(|s| !s.is_empty())
}

//--------------------------------------       Requests        -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemPayload {
    #[serde(alias = "productId")]
    pub id: String,
    /// Accepted as any JSON number; rejected unless finite and positive.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

/// The checkout payload shared by the PayPal create-order and M-Pesa initiate routes. Flat, with free-text
/// contact fields alongside the cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub cart_items: Vec<CartItemPayload>,
    /// Client-declared total in major units. Cross-checked against the catalog server-side.
    pub total: Option<f64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// When present on the M-Pesa initiate route, retry this existing order instead of creating a new one.
    pub local_order_id: Option<String>,
}

impl CheckoutBody {
    pub fn to_checkout_request(&self) -> Result<CheckoutRequest, ServerError> {
        let mut entries = Vec::with_capacity(self.cart_items.len());
        for item in &self.cart_items {
            let product_id = sanitize_text(&item.id, MAX_PRODUCT_ID_LEN);
            if product_id.is_empty() || !item.quantity.is_finite() || item.quantity <= 0.0 {
                return Err(ServerError::InvalidRequestBody("Invalid cart item payload".to_string()));
            }
            #[allow(clippy::cast_possible_truncation)]
            entries.push(CartEntry { product_id, quantity: item.quantity.floor() as i64 });
        }
        let declared_total = match self.total {
            Some(t) => Some(
                Cents::try_from(t).map_err(|e| ServerError::InvalidRequestBody(format!("Invalid total: {e}")))?,
            ),
            None => None,
        };
        let mut checkout = CheckoutRequest::new(entries);
        checkout.declared_total = declared_total;
        checkout.customer_name = sanitize_opt(&self.name, MAX_NAME_LEN);
        checkout.customer_email = sanitize_opt(&self.email, MAX_EMAIL_LEN);
        checkout.customer_phone = sanitize_opt(&self.phone, MAX_PHONE_LEN);
        checkout.shipping_address = sanitize_opt(&self.address, MAX_ADDRESS_LEN);
        Ok(checkout)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureOrderBody {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "localOrderId")]
    pub local_order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackTokenQuery {
    pub token: Option<String>,
}

//--------------------------------------   Inbound payloads    -------------------------------------------------------

fn first_str<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| node[k].as_str())
}

/// Extracts the fields the engine acts on from a raw Daraja STK callback. The callback may arrive wrapped in
/// `Body.stkCallback`, in a bare `stkCallback`, or unwrapped; `ResultCode` may be a number or a string, and a
/// missing result code is treated as a failure. `None` means no checkout request id could be found.
pub fn parse_stk_callback(payload: &Value) -> Option<StkCallback> {
    let callback = [&payload["Body"]["stkCallback"], &payload["stkCallback"], payload]
        .into_iter()
        .find(|node| node.is_object())?;
    let checkout_request_id =
        first_str(callback, &["CheckoutRequestID", "checkoutRequestId", "CheckoutRequestId"])?.to_string();
    let code_node = &callback["ResultCode"];
    let result_code = code_node
        .as_i64()
        .or_else(|| code_node.as_str().and_then(|s| s.parse().ok()))
        .or_else(|| callback["resultCode"].as_i64())
        .unwrap_or(1);
    let result_desc = first_str(callback, &["ResultDesc", "resultDesc"]).map(String::from);
    Some(StkCallback { checkout_request_id, result_code, result_desc })
}

/// Extracts the fields the engine acts on from a raw PayPal webhook event. `None` means the event carries no id
/// or no type.
pub fn parse_webhook_event(event: &Value) -> Option<WebhookNotification> {
    let event_id = event["id"].as_str()?.to_string();
    let event_type = event["event_type"].as_str()?.to_string();
    let capture_id = event["resource"]["id"].as_str().map(String::from);
    let paypal_order_id =
        event["resource"]["supplementary_data"]["related_ids"]["order_id"].as_str().map(String::from);
    Some(WebhookNotification { event_id, event_type, capture_id, paypal_order_id, raw: event.clone() })
}

//--------------------------------------       Responses       -------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PaypalCreateOrderResponse {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "localOrderId")]
    pub local_order_id: String,
}
