//! `SqliteDatabase` is a concrete implementation of a payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, events, new_pool, orders, products};
use crate::{
    db_types::{
        EventStage,
        NewOrder,
        NewPaymentEvent,
        Order,
        OrderId,
        OrderItem,
        PaymentEvent,
        PaymentStatus,
        Product,
    },
    traits::{CatalogReader, DuplicateMatch, PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Stores the order, its line items and the `*_initiate` audit event in one transaction. Either the whole
    /// order exists, or none of it does.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let saved = orders::insert_order(&order, &mut tx).await?;
        orders::insert_items(&saved.id, &order.items, &mut tx).await?;
        let initiate = NewPaymentEvent::new(
            saved.id.clone(),
            EventStage::initiate_for(order.payment_provider),
            PaymentStatus::Pending,
        )
        .with_message(format!("Order created for {} via {}", saved.total_price, order.payment_provider));
        events::insert_event(initiate, &mut tx).await?;
        tx.commit().await?;
        debug!("📝️ Order [{}] created: {} for {}", saved.id, saved.total_price, saved.payment_provider);
        Ok(saved)
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_ref(payment_ref, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_paypal_order(
        &self,
        capture_id: Option<&str>,
        paypal_order_id: Option<&str>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_paypal_order(capture_id, paypal_order_id, &mut conn).await?;
        Ok(order)
    }

    async fn set_paypal_order_id(&self, id: &OrderId, paypal_order_id: &str) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_paypal_order_id(id, paypal_order_id, &mut conn)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))?;
        Ok(order)
    }

    async fn set_mpesa_checkout_request(
        &self,
        id: &OrderId,
        checkout_request_id: &str,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_mpesa_checkout_request(id, checkout_request_id, &mut conn)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))?;
        Ok(order)
    }

    async fn mark_order_paid(
        &self,
        id: &OrderId,
        payment_ref: Option<&str>,
        capture_id: Option<&str>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::mark_paid(id, payment_ref, capture_id, &mut conn).await?;
        if order.is_none() {
            debug!("📝️ Order [{id}] was already paid. Transition skipped.");
        }
        Ok(order)
    }

    async fn mark_order_failed(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::mark_failed(id, &mut conn).await?;
        Ok(order)
    }

    async fn append_event(&self, event: NewPaymentEvent) -> Result<PaymentEvent, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event = events::insert_event(event, &mut conn).await?;
        Ok(event)
    }

    async fn append_event_if_absent(
        &self,
        event: NewPaymentEvent,
        match_on: DuplicateMatch,
    ) -> Result<Option<PaymentEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event = events::insert_event_if_absent(event, match_on, &mut conn).await?;
        Ok(event)
    }

    async fn has_matching_event(
        &self,
        id: &OrderId,
        stage: EventStage,
        provider_ref: &str,
        status: Option<PaymentStatus>,
    ) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let exists = events::has_matching_event(id, stage, provider_ref, status, &mut conn).await?;
        Ok(exists)
    }

    async fn fetch_events_for_order(&self, id: &OrderId) -> Result<Vec<PaymentEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let events = events::fetch_events_for_order(id, &mut conn).await?;
        Ok(events)
    }

    async fn fetch_items_for_order(&self, id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items_for_order(id, &mut conn).await?;
        Ok(items)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogReader for SqliteDatabase {
    async fn fetch_products(&self, ids: &[String]) -> Result<Vec<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(ids, &mut conn).await?;
        Ok(products)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Runs any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
