//! A thin client for Safaricom's Daraja M-Pesa API.
//!
//! Covers exactly what the Kahawa payment server needs: OAuth tokens and STK push (Lipa na M-Pesa Online)
//! initiation. Callback handling lives server-side; this crate only sends the prompt.
mod api;
mod config;
mod data_objects;
mod error;
mod helpers;

pub use api::MpesaApi;
pub use config::MpesaConfig;
pub use data_objects::StkPushResponse;
pub use error::MpesaApiError;
pub use helpers::{daraja_timestamp, stk_password};
