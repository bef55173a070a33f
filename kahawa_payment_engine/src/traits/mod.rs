//! # Backend and provider interface contracts.
//!
//! This module defines the interfaces the payment engine is built against.
//!
//! ## Storage
//! [`PaymentGatewayDatabase`] is the contract a storage backend must satisfy: atomic order creation, audit-trail
//! appends with duplicate suppression, and the conditional status transitions that keep a paid order paid.
//! [`CatalogReader`] is the small read-only slice of the product catalog the engine needs to price a cart.
//!
//! ## Providers
//! [`RedirectProvider`] and [`PushProvider`] abstract over the two payment rails the storefront supports. A
//! redirect provider (PayPal) creates a checkout session that the buyer approves in their browser and the server
//! captures afterwards. A push provider (M-Pesa) sends a prompt to the buyer's phone and reports the outcome via an
//! asynchronous callback.
mod catalog;
mod payment_gateway_database;
mod providers;

pub use catalog::CatalogReader;
pub use payment_gateway_database::{DuplicateMatch, PaymentGatewayDatabase, PaymentGatewayError};
pub use providers::{CaptureOutcome, ProviderError, PushOutcome, PushProvider, PushRequest, RedirectProvider, WebhookSignature};

/// A backend that can both drive the payment lifecycle and price carts. This is what the server's checkout routes
/// need; it is implemented automatically.
pub trait StorefrontDatabase: PaymentGatewayDatabase + CatalogReader {}

impl<T: PaymentGatewayDatabase + CatalogReader> StorefrontDatabase for T {}
