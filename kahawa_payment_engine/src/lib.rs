//! Kahawa Payment Engine
//!
//! The payment engine is the core of the Kahawa coffee storefront backend: it prices carts against the catalog,
//! tracks orders through the payment lifecycle, and reconciles the notifications that come back from the payment
//! providers. It is HTTP-framework agnostic; the Kahawa Payment Server wraps it in an actix-web surface.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@sqlite`]). SQLite is the supported backend. You should never need to access the database
//!    directly; use the flow API instead. The exception is the data types used in the database, which are defined
//!    in [`mod@db_types`] and are public.
//! 2. The interface contracts ([`mod@traits`]). Storage backends implement [`traits::PaymentGatewayDatabase`] and
//!    [`traits::CatalogReader`]; payment providers implement [`traits::RedirectProvider`] or
//!    [`traits::PushProvider`].
//! 3. The flow API ([`mod@flow`]). [`PaymentFlowApi`] is the public-facing functionality: checkout, capture, STK
//!    push, and notification reconciliation, with duplicate suppression and a terminal `paid` status throughout.
pub mod cart;
pub mod db_types;
pub mod flow;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use flow::PaymentFlowApi;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
