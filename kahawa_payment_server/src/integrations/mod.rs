//! Adapters connecting the payment engine's provider traits to the PayPal and Daraja REST clients.
mod mpesa;
mod paypal;

pub use mpesa::MpesaGateway;
pub use paypal::PaypalGateway;
