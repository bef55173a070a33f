use kps_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cart::CartEntry,
    db_types::{OrderId, PaymentStatus},
};

/// A client checkout submission: the cart plus optional contact details. The declared total, when present, is only
/// a cross-check against the server-computed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartEntry>,
    pub declared_total: Option<Cents>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
}

impl CheckoutRequest {
    pub fn new(items: Vec<CartEntry>) -> Self {
        Self {
            items,
            declared_total: None,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            shipping_address: None,
        }
    }
}

/// A freshly created PayPal checkout session. The client redirects the buyer using `paypal_order_id` and polls
/// `local_order_id` afterwards.
#[derive(Debug, Clone)]
pub struct PaypalCheckout {
    pub paypal_order_id: String,
    pub local_order_id: OrderId,
}

/// Outcome of a capture attempt against an approved PayPal session.
#[derive(Debug, Clone)]
pub enum CaptureResult {
    /// The order was already paid. No provider call was made and nothing changed.
    AlreadyCaptured { order_id: OrderId },
    Captured { order_id: OrderId, capture_id: Option<String> },
    /// The provider declined the capture. The order is now `failed`.
    Declined { order_id: OrderId },
}

/// Where the order for an STK push comes from: an existing order being (re)tried, or a fresh checkout.
#[derive(Debug, Clone)]
pub enum MpesaOrderSource {
    Existing(OrderId),
    New(CheckoutRequest),
}

/// Outcome of initiating an STK push.
#[derive(Debug, Clone)]
pub enum PushInitiation {
    /// The referenced order is already paid; no prompt was sent.
    AlreadyPaid { order_id: OrderId },
    Sent { order_id: OrderId, checkout_request_id: String, customer_message: Option<String>, mock: bool },
}

/// An M-Pesa STK result callback, reduced to the fields the engine acts on. The raw payload travels separately and
/// is stored verbatim in the audit trail.
#[derive(Debug, Clone)]
pub struct StkCallback {
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: Option<String>,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// A verified PayPal webhook delivery, reduced to the fields the engine acts on.
#[derive(Debug, Clone)]
pub struct WebhookNotification {
    /// PayPal's delivery id. Identifies a delivery regardless of outcome; the duplicate key for webhooks.
    pub event_id: String,
    pub event_type: String,
    pub capture_id: Option<String>,
    pub paypal_order_id: Option<String>,
    pub raw: Value,
}

/// Outcome of processing an inbound provider notification (STK callback or webhook).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The notification changed the order's payment status.
    Applied { order_id: OrderId, status: PaymentStatus },
    /// A matching notification was already processed. Nothing changed.
    Duplicate { order_id: OrderId },
    /// The order is already paid and stays paid. Nothing changed.
    AlreadyPaid { order_id: OrderId },
    /// No order matches the notification's reference. Acknowledged and dropped.
    Unmatched,
    /// An informational event type was recorded in the audit trail without a status change.
    Recorded { order_id: OrderId },
}
