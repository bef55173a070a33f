//! A thin client for the PayPal Orders v2 REST API.
//!
//! Covers exactly what the Kahawa payment server needs: OAuth client-credentials tokens, creating and capturing
//! checkout orders, and verifying webhook signatures via PayPal's verification endpoint.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::PaypalApi;
pub use config::PaypalConfig;
pub use data_objects::{CaptureResponse, OrderCreated, WebhookSignature};
pub use error::PaypalApiError;
