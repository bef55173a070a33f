use thiserror::Error;

use crate::db_types::{
    InvalidOrderId,
    NewOrder,
    NewPaymentEvent,
    Order,
    OrderId,
    OrderItem,
    PaymentEvent,
    PaymentStatus,
};

/// Controls which columns participate in the duplicate check of [`PaymentGatewayDatabase::append_event_if_absent`].
///
/// M-Pesa retries a callback with the *same* result; a success and a failure for the same checkout request are
/// distinct events, so the resulting status is part of the key. PayPal webhook deliveries are identified by the
/// event id alone, whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMatch {
    StageAndRef,
    StageRefAndStatus,
}

/// The contract a storage backend must satisfy to drive the payment engine.
///
/// The backend owns the two invariants the engine leans on:
/// * `payment_status` never leaves `paid`. All transitions are conditional updates that no-op (and say so) when the
///   order is already paid.
/// * the audit trail is append-only, and [`append_event_if_absent`] is atomic with respect to concurrent deliveries
///   of the same notification.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order, its line items, and the `*_initiate` audit event in a single transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Looks an order up by its provider-assigned payment reference (M-Pesa checkout request id, or the PayPal
    /// reference once assigned).
    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// Finds the PayPal order matching either the capture id or the checkout-session id. Only orders with the
    /// PayPal provider are considered; an M-Pesa order can never match a webhook.
    async fn fetch_paypal_order(
        &self,
        capture_id: Option<&str>,
        paypal_order_id: Option<&str>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Records the checkout-session id PayPal assigned to the order. The id is also stored as the payment
    /// reference until a capture id supersedes it.
    async fn set_paypal_order_id(&self, id: &OrderId, paypal_order_id: &str) -> Result<Order, PaymentGatewayError>;

    /// Records the STK checkout request id as the order's payment reference.
    async fn set_mpesa_checkout_request(
        &self,
        id: &OrderId,
        checkout_request_id: &str,
    ) -> Result<Order, PaymentGatewayError>;

    /// Transitions the order to `paid` and advances fulfillment from `pending` to `processing`.
    ///
    /// The update is conditional on the order not already being paid. Returns the updated order, or `None` when
    /// the order was already paid and nothing changed. A provided `payment_ref` or `capture_id` supersedes the
    /// stored value; `None` leaves it alone.
    async fn mark_order_paid(
        &self,
        id: &OrderId,
        payment_ref: Option<&str>,
        capture_id: Option<&str>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Transitions the order's payment status to `failed`. Conditional on the current status being `pending`;
    /// returns `None` when no row changed (the order was already paid or already failed).
    async fn mark_order_failed(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Appends an audit event unconditionally.
    async fn append_event(&self, event: NewPaymentEvent) -> Result<PaymentEvent, PaymentGatewayError>;

    /// Appends an audit event unless a matching one already exists, in one atomic statement.
    ///
    /// `match_on` selects the duplicate key. Returns the inserted event, or `None` when the event was suppressed
    /// as a duplicate. Two racing deliveries of the same notification resolve to exactly one insert.
    async fn append_event_if_absent(
        &self,
        event: NewPaymentEvent,
        match_on: DuplicateMatch,
    ) -> Result<Option<PaymentEvent>, PaymentGatewayError>;

    /// Reports whether an event with the given key already exists. Advisory only; the atomic duplicate check is
    /// [`append_event_if_absent`].
    async fn has_matching_event(
        &self,
        id: &OrderId,
        stage: crate::db_types::EventStage,
        provider_ref: &str,
        status: Option<PaymentStatus>,
    ) -> Result<bool, PaymentGatewayError>;

    async fn fetch_events_for_order(&self, id: &OrderId) -> Result<Vec<PaymentEvent>, PaymentGatewayError>;

    async fn fetch_items_for_order(&self, id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),
    #[error("The cart contains no items")]
    EmptyCart,
    #[error("The order total must be greater than zero")]
    InvalidTotal,
    #[error("Unknown product in cart: {0}")]
    ItemNotFound(String),
    #[error("Cart total mismatch. Client declared {declared}, server computed {computed}")]
    TotalMismatch { declared: String, computed: String },
    #[error("Invalid M-Pesa phone number: {0}")]
    InvalidPhone(String),
    #[error("Payment provider error: {0}")]
    ProviderError(#[from] super::providers::ProviderError),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<InvalidOrderId> for PaymentGatewayError {
    fn from(e: InvalidOrderId) -> Self {
        PaymentGatewayError::InvalidOrderId(e.0)
    }
}
