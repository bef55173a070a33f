use std::fmt::Debug;

use kps_common::DEFAULT_CURRENCY_CODE;
use log::*;

use crate::{
    cart::price_cart,
    db_types::{EventStage, NewOrder, NewPaymentEvent, Order, OrderId, OrderStatusProjection, PaymentProvider, PaymentStatus},
    flow::flow_objects::{
        CaptureResult,
        CheckoutRequest,
        MpesaOrderSource,
        NotificationOutcome,
        PaypalCheckout,
        PushInitiation,
        StkCallback,
        WebhookNotification,
    },
    helpers::{is_valid_mpesa_phone, normalize_mpesa_phone},
    traits::{
        CatalogReader,
        DuplicateMatch,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PushProvider,
        PushRequest,
        RedirectProvider,
    },
};

pub const WEBHOOK_CAPTURE_COMPLETED: &str = "PAYMENT.CAPTURE.COMPLETED";
pub const WEBHOOK_CAPTURE_DENIED: &str = "PAYMENT.CAPTURE.DENIED";
pub const WEBHOOK_CAPTURE_REVERSED: &str = "PAYMENT.CAPTURE.REVERSED";
pub const WEBHOOK_CAPTURE_REFUNDED: &str = "PAYMENT.CAPTURE.REFUNDED";

/// `PaymentFlowApi` is the primary API for moving orders through the payment lifecycle: creating priced orders,
/// driving the provider rails, and reconciling the notifications that come back.
///
/// Every path through this API preserves two properties:
/// * a `paid` order never changes payment status again, and
/// * every provider interaction leaves an entry in the order's audit trail.
pub struct PaymentFlowApi<B> {
    db: B,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentGatewayDatabase + CatalogReader
{
    /// Prices the cart, stores the order, and opens a PayPal checkout session for it.
    ///
    /// The order is created `pending` before the provider is contacted, so a provider failure leaves a priced,
    /// retryable order behind rather than nothing.
    pub async fn create_paypal_order<P: RedirectProvider>(
        &self,
        provider: &P,
        checkout: CheckoutRequest,
    ) -> Result<PaypalCheckout, PaymentGatewayError> {
        let cart = price_cart(&self.db, &checkout.items, checkout.declared_total).await?;
        let order = NewOrder::new(cart.items, cart.total, PaymentProvider::Paypal).with_contact(
            checkout.customer_name,
            checkout.customer_email,
            checkout.customer_phone,
            checkout.shipping_address,
        );
        let order = self.db.insert_order(order).await?;
        let paypal_order_id = provider.create_order(order.total_price, DEFAULT_CURRENCY_CODE).await?;
        let order = self.db.set_paypal_order_id(&order.id, &paypal_order_id).await?;
        let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalOrderCreated, PaymentStatus::Pending)
            .with_provider_ref(paypal_order_id.clone());
        self.db.append_event(event).await?;
        debug!("🔄️ Order [{}] opened PayPal session {paypal_order_id}", order.id);
        Ok(PaypalCheckout { paypal_order_id, local_order_id: order.id })
    }

    /// Sends an STK push for an order, either an existing one or a fresh checkout.
    ///
    /// The phone number is validated up front; no order is created for an invalid number.
    pub async fn initiate_mpesa_push<P: PushProvider>(
        &self,
        provider: &P,
        phone: &str,
        source: MpesaOrderSource,
    ) -> Result<PushInitiation, PaymentGatewayError> {
        if !is_valid_mpesa_phone(phone) {
            return Err(PaymentGatewayError::InvalidPhone(phone.to_string()));
        }
        let msisdn = normalize_mpesa_phone(phone);
        let order = match source {
            MpesaOrderSource::Existing(id) => {
                self.db.fetch_order_by_id(&id).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?
            },
            MpesaOrderSource::New(checkout) => {
                let cart = price_cart(&self.db, &checkout.items, checkout.declared_total).await?;
                let order = NewOrder::new(cart.items, cart.total, PaymentProvider::Mpesa).with_contact(
                    checkout.customer_name,
                    checkout.customer_email,
                    Some(msisdn.clone()),
                    checkout.shipping_address,
                );
                self.db.insert_order(order).await?
            },
        };
        if order.is_paid() {
            info!("🔄️ Order [{}] is already paid. Not sending an STK push.", order.id);
            return Ok(PushInitiation::AlreadyPaid { order_id: order.id });
        }
        let request = PushRequest {
            phone: msisdn,
            amount: order.total_price,
            reference: order.id.to_string(),
            description: format!("Kahawa order {}", order.id),
        };
        let outcome = provider.initiate_push(request).await?;
        let order = self.db.set_mpesa_checkout_request(&order.id, &outcome.checkout_request_id).await?;
        let mut event = NewPaymentEvent::new(order.id.clone(), EventStage::MpesaStkSent, PaymentStatus::Pending)
            .with_provider_ref(outcome.checkout_request_id.clone())
            .with_payload(outcome.raw.clone());
        if let Some(msg) = &outcome.customer_message {
            event = event.with_message(msg.clone());
        }
        self.db.append_event(event).await?;
        debug!("🔄️ Order [{}] STK push sent: {}{}", order.id, outcome.checkout_request_id, if outcome.mock { " (mock)" } else { "" });
        Ok(PushInitiation::Sent {
            order_id: order.id,
            checkout_request_id: outcome.checkout_request_id,
            customer_message: outcome.customer_message,
            mock: outcome.mock,
        })
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Captures an approved PayPal checkout session for a local order.
    ///
    /// Capturing an order that is already paid short-circuits without a provider call; PayPal treats a second
    /// capture of the same session as an error, and the order cannot change anyway.
    pub async fn capture_paypal_order<P: RedirectProvider>(
        &self,
        provider: &P,
        order_id: &OrderId,
        paypal_order_id: &str,
    ) -> Result<CaptureResult, PaymentGatewayError> {
        let order = self
            .db
            .fetch_order_by_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        if order.is_paid() {
            info!("🔄️ Order [{}] is already paid. Capture request short-circuited.", order.id);
            return Ok(CaptureResult::AlreadyCaptured { order_id: order.id });
        }
        let outcome = provider.capture_order(paypal_order_id).await?;
        if outcome.is_completed() {
            let payment_ref = outcome.capture_id.as_deref().unwrap_or(paypal_order_id);
            let updated =
                self.db.mark_order_paid(&order.id, Some(payment_ref), outcome.capture_id.as_deref()).await?;
            let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalCapture, PaymentStatus::Paid)
                .with_provider_ref(payment_ref)
                .with_payload(outcome.raw);
            self.db.append_event(event).await?;
            match updated {
                Some(order) => {
                    info!("🔄️ Order [{}] captured and paid ({})", order.id, order.total_price);
                    Ok(CaptureResult::Captured { order_id: order.id, capture_id: outcome.capture_id })
                },
                // Lost a race against the webhook. The money is captured either way.
                None => Ok(CaptureResult::AlreadyCaptured { order_id: order.id }),
            }
        } else {
            warn!("🔄️ Order [{}] capture came back {}", order.id, outcome.status);
            self.db.mark_order_failed(&order.id).await?;
            let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalCapture, PaymentStatus::Failed)
                .with_provider_ref(paypal_order_id)
                .with_message(outcome.status)
                .with_payload(outcome.raw);
            self.db.append_event(event).await?;
            Ok(CaptureResult::Declined { order_id: order.id })
        }
    }

    /// Reconciles an M-Pesa STK result callback against its order.
    ///
    /// Duplicate deliveries (same checkout request, same result) are suppressed via the audit trail. A success and
    /// a failure for the same checkout request are distinct events, but a paid order never leaves `paid`.
    pub async fn handle_mpesa_callback(
        &self,
        callback: StkCallback,
        raw: serde_json::Value,
    ) -> Result<NotificationOutcome, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_payment_ref(&callback.checkout_request_id).await? else {
            warn!("🔄️ STK callback for unknown checkout request {}. Dropped.", callback.checkout_request_id);
            return Ok(NotificationOutcome::Unmatched);
        };
        let target = if callback.is_success() { PaymentStatus::Paid } else { PaymentStatus::Failed };
        let seen = self
            .db
            .has_matching_event(&order.id, EventStage::MpesaCallback, &callback.checkout_request_id, Some(target))
            .await?;
        if seen {
            debug!("🔄️ Order [{}] duplicate STK callback ({target}). Suppressed.", order.id);
            return Ok(NotificationOutcome::Duplicate { order_id: order.id });
        }
        if order.is_paid() {
            info!("🔄️ Order [{}] is already paid. STK callback ({target}) ignored.", order.id);
            return Ok(NotificationOutcome::AlreadyPaid { order_id: order.id });
        }
        let mut event = NewPaymentEvent::new(order.id.clone(), EventStage::MpesaCallback, target)
            .with_provider_ref(callback.checkout_request_id.clone())
            .with_payload(raw);
        if let Some(desc) = &callback.result_desc {
            event = event.with_message(desc.clone());
        }
        let inserted = self.db.append_event_if_absent(event, DuplicateMatch::StageRefAndStatus).await?;
        if inserted.is_none() {
            // A concurrent delivery won the insert race.
            return Ok(NotificationOutcome::Duplicate { order_id: order.id });
        }
        let updated = match target {
            PaymentStatus::Paid => self.db.mark_order_paid(&order.id, None, None).await?,
            _ => self.db.mark_order_failed(&order.id).await?,
        };
        match updated {
            Some(order) => {
                info!("🔄️ Order [{}] is now {} via M-Pesa callback", order.id, order.payment_status);
                Ok(NotificationOutcome::Applied { order_id: order.id, status: target })
            },
            None if target == PaymentStatus::Paid => Ok(NotificationOutcome::AlreadyPaid { order_id: order.id }),
            // A failure callback for an order that is no longer pending. The event is on record; the order stands.
            None => Ok(NotificationOutcome::Applied { order_id: order.id, status: order.payment_status }),
        }
    }

    /// Reconciles a verified PayPal webhook delivery against its order.
    ///
    /// Deliveries are deduplicated on the webhook event id alone. Signature verification is the transport layer's
    /// job; by the time a notification reaches this method it is trusted.
    pub async fn handle_paypal_webhook(
        &self,
        notification: WebhookNotification,
    ) -> Result<NotificationOutcome, PaymentGatewayError> {
        let Some(order) = self
            .db
            .fetch_paypal_order(notification.capture_id.as_deref(), notification.paypal_order_id.as_deref())
            .await?
        else {
            warn!("🔄️ Webhook {} ({}) matches no order. Dropped.", notification.event_id, notification.event_type);
            return Ok(NotificationOutcome::Unmatched);
        };
        let seen =
            self.db.has_matching_event(&order.id, EventStage::PaypalWebhook, &notification.event_id, None).await?;
        if seen {
            debug!("🔄️ Order [{}] duplicate webhook delivery {}. Suppressed.", order.id, notification.event_id);
            return Ok(NotificationOutcome::Duplicate { order_id: order.id });
        }
        match notification.event_type.as_str() {
            WEBHOOK_CAPTURE_COMPLETED => {
                if order.is_paid() {
                    info!("🔄️ Order [{}] is already paid. Webhook {} ignored.", order.id, notification.event_id);
                    return Ok(NotificationOutcome::AlreadyPaid { order_id: order.id });
                }
                let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalWebhook, PaymentStatus::Paid)
                    .with_provider_ref(notification.event_id.clone())
                    .with_message(notification.event_type.clone())
                    .with_payload(notification.raw);
                if self.db.append_event_if_absent(event, DuplicateMatch::StageAndRef).await?.is_none() {
                    return Ok(NotificationOutcome::Duplicate { order_id: order.id });
                }
                let updated = self
                    .db
                    .mark_order_paid(&order.id, notification.capture_id.as_deref(), notification.capture_id.as_deref())
                    .await?;
                match updated {
                    Some(order) => {
                        info!("🔄️ Order [{}] confirmed paid via webhook", order.id);
                        Ok(NotificationOutcome::Applied { order_id: order.id, status: PaymentStatus::Paid })
                    },
                    None => Ok(NotificationOutcome::AlreadyPaid { order_id: order.id }),
                }
            },
            WEBHOOK_CAPTURE_DENIED | WEBHOOK_CAPTURE_REVERSED | WEBHOOK_CAPTURE_REFUNDED => {
                if order.is_paid() && notification.event_type == WEBHOOK_CAPTURE_DENIED {
                    // A denial after a successful capture is provider noise. Paid stays paid.
                    info!("🔄️ Order [{}] is paid; webhook {} ignored.", order.id, notification.event_type);
                    return Ok(NotificationOutcome::AlreadyPaid { order_id: order.id });
                }
                let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalWebhook, PaymentStatus::Failed)
                    .with_provider_ref(notification.event_id.clone())
                    .with_message(notification.event_type.clone())
                    .with_payload(notification.raw);
                if self.db.append_event_if_absent(event, DuplicateMatch::StageAndRef).await?.is_none() {
                    return Ok(NotificationOutcome::Duplicate { order_id: order.id });
                }
                let updated = self.db.mark_order_failed(&order.id).await?;
                match updated {
                    Some(order) => {
                        warn!("🔄️ Order [{}] failed via webhook {}", order.id, notification.event_type);
                        Ok(NotificationOutcome::Applied { order_id: order.id, status: PaymentStatus::Failed })
                    },
                    // Refunds and reversals of paid orders are recorded but handled out of band.
                    None => Ok(NotificationOutcome::Recorded { order_id: order.id }),
                }
            },
            other => {
                let event = NewPaymentEvent::new(order.id.clone(), EventStage::PaypalWebhook, order.payment_status)
                    .with_provider_ref(notification.event_id.clone())
                    .with_message(other.to_string())
                    .with_payload(notification.raw);
                match self.db.append_event_if_absent(event, DuplicateMatch::StageAndRef).await? {
                    Some(_) => {
                        debug!("🔄️ Order [{}] informational webhook {} recorded", order.id, other);
                        Ok(NotificationOutcome::Recorded { order_id: order.id })
                    },
                    None => Ok(NotificationOutcome::Duplicate { order_id: order.id }),
                }
            },
        }
    }

    /// Returns the status projection clients poll after checkout.
    pub async fn order_status(&self, id: &str) -> Result<OrderStatusProjection, PaymentGatewayError> {
        let id: OrderId = id.parse()?;
        let order = self.db.fetch_order_by_id(&id).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?;
        Ok(OrderStatusProjection::from(&order))
    }

    /// Returns the full audit trail for an order.
    pub async fn order_events(&self, id: &OrderId) -> Result<Vec<crate::db_types::PaymentEvent>, PaymentGatewayError> {
        self.db.fetch_events_for_order(id).await
    }

    pub async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_id(id).await
    }
}
