mod flow_objects;
mod payment_flow_api;

pub use flow_objects::{
    CaptureResult,
    CheckoutRequest,
    MpesaOrderSource,
    NotificationOutcome,
    PaypalCheckout,
    PushInitiation,
    StkCallback,
    WebhookNotification,
};
pub use payment_flow_api::PaymentFlowApi;
