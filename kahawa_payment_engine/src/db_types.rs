use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use kps_common::Cents;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
/// Server-generated order identifier: 24 lowercase hex characters.
///
/// The id doubles as the M-Pesa account reference, so it must stay short and alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

const ORDER_ID_LEN: usize = 24;
const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

impl OrderId {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..ORDER_ID_LEN).map(|_| HEX_CHARS[rng.gen_range(0..16)] as char).collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(s: &str) -> bool {
        s.len() == ORDER_ID_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order id: {0}")]
pub struct InvalidOrderId(pub String);

impl FromStr for OrderId {
    type Err = InvalidOrderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if OrderId::is_valid(s) {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(InvalidOrderId(s.to_string()))
        }
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a fresh idempotency token for a new order. 32 hex characters.
pub fn new_idempotency_key() -> String {
    let mut rng = rand::thread_rng();
    (0..32).map(|_| HEX_CHARS[rng.gen_range(0..16)] as char).collect()
}

//--------------------------------------     PaymentStatus     -------------------------------------------------------
/// Payment status of an order. `pending → paid | failed`. Once `paid`, the status is terminal: no event may move a
/// paid order back to pending or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct StatusConversionError(String);

impl FromStr for PaymentStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(StatusConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      OrderStatus      -------------------------------------------------------
/// Fulfillment status of an order. `pending → processing → shipped → delivered`, with `cancelled` reachable from
/// pending/processing. The engine only ever advances pending → processing (on payment); the rest is admin-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentProvider    -------------------------------------------------------
/// The provider handling payment for an order. Exactly one provider is associated with each order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paypal,
    Mpesa,
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::Paypal => write!(f, "paypal"),
            PaymentProvider::Mpesa => write!(f, "mpesa"),
        }
    }
}

impl FromStr for PaymentProvider {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paypal" => Ok(Self::Paypal),
            "mpesa" => Ok(Self::Mpesa),
            s => Err(StatusConversionError(format!("Invalid payment provider: {s}"))),
        }
    }
}

//--------------------------------------      EventStage       -------------------------------------------------------
/// The stage tag of a payment event. Together with the provider reference (and for callbacks, the resulting status)
/// it forms the duplicate-suppression key for inbound notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStage {
    PaypalInitiate,
    PaypalOrderCreated,
    PaypalCapture,
    PaypalWebhook,
    MpesaInitiate,
    MpesaStkSent,
    MpesaCallback,
}

impl EventStage {
    /// The stage recorded when an order is first created for the given provider.
    pub fn initiate_for(provider: PaymentProvider) -> Self {
        match provider {
            PaymentProvider::Paypal => Self::PaypalInitiate,
            PaymentProvider::Mpesa => Self::MpesaInitiate,
        }
    }
}

impl Display for EventStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStage::PaypalInitiate => "paypal_initiate",
            EventStage::PaypalOrderCreated => "paypal_order_created",
            EventStage::PaypalCapture => "paypal_capture",
            EventStage::PaypalWebhook => "paypal_webhook",
            EventStage::MpesaInitiate => "mpesa_initiate",
            EventStage::MpesaStkSent => "mpesa_stk_sent",
            EventStage::MpesaCallback => "mpesa_callback",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Provider-assigned payment reference. PayPal: checkout-session id, later the capture id. M-Pesa: the STK
    /// checkout request id. Unique where present.
    pub payment_ref: Option<String>,
    pub paypal_order_id: Option<String>,
    pub paypal_capture_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    /// Server-computed total. Immutable after creation.
    pub total_price: Cents,
    pub payment_provider: PaymentProvider,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    /// Name snapshot taken from the catalog at checkout time.
    pub name: String,
    pub quantity: i64,
    /// Unit price snapshot taken from the catalog at checkout time.
    pub price: Cents,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub items: Vec<NewOrderItem>,
    pub total_price: Cents,
    pub payment_provider: PaymentProvider,
    pub idempotency_key: String,
}

impl NewOrder {
    pub fn new(items: Vec<NewOrderItem>, total_price: Cents, provider: PaymentProvider) -> Self {
        Self {
            id: OrderId::random(),
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            shipping_address: None,
            items,
            total_price,
            payment_provider: provider,
            idempotency_key: new_idempotency_key(),
        }
    }

    pub fn with_contact(
        mut self,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        address: Option<String>,
    ) -> Self {
        self.customer_name = name;
        self.customer_email = email;
        self.customer_phone = phone;
        self.shipping_address = address;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: Cents,
}

//--------------------------------------     PaymentEvent      -------------------------------------------------------
/// One immutable entry in an order's payment audit trail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub stage: EventStage,
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub message: Option<String>,
    /// Raw provider payload, stored verbatim as JSON text. Never interpreted after the fact; providers evolve their
    /// schemas independently.
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn payload_json(&self) -> Option<Value> {
        self.payload.as_deref().and_then(|p| serde_json::from_str(p).ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub order_id: OrderId,
    pub stage: EventStage,
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub message: Option<String>,
    pub payload: Option<Value>,
}

impl NewPaymentEvent {
    pub fn new(order_id: OrderId, stage: EventStage, status: PaymentStatus) -> Self {
        Self { order_id, stage, status, provider_ref: None, message: None, payload: None }
    }

    pub fn with_provider_ref<S: Into<String>>(mut self, provider_ref: S) -> Self {
        self.provider_ref = Some(provider_ref.into());
        self
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

//--------------------------------------       Product         -------------------------------------------------------
/// A catalog entry as seen by the payment engine: just enough to price a cart.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Cents,
}

//-------------------------------------- OrderStatusProjection -------------------------------------------------------
/// Read-only projection returned to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusProjection {
    pub id: OrderId,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub payment_provider: PaymentProvider,
    pub payment_ref: Option<String>,
    pub total_price: Cents,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderStatusProjection {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            payment_status: order.payment_status,
            order_status: order.order_status,
            payment_provider: order.payment_provider,
            payment_ref: order.payment_ref.clone(),
            total_price: order.total_price,
            created_at: order.created_at,
        }
    }
}
