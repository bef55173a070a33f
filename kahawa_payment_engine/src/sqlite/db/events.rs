use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{EventStage, NewPaymentEvent, OrderId, PaymentEvent, PaymentStatus},
    traits::DuplicateMatch,
};

pub async fn insert_event(
    event: NewPaymentEvent,
    conn: &mut SqliteConnection,
) -> Result<PaymentEvent, sqlx::Error> {
    let payload = event.payload.map(|p| p.to_string());
    let event = sqlx::query_as(
        r#"
            INSERT INTO payment_events (order_id, stage, status, provider_ref, message, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(event.order_id)
    .bind(event.stage)
    .bind(event.status)
    .bind(event.provider_ref)
    .bind(event.message)
    .bind(payload)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

/// Inserts the event unless a matching one already exists, as a single `INSERT .. SELECT .. WHERE NOT EXISTS`
/// statement. SQLite serializes writers, so of two racing deliveries exactly one insert survives; the loser gets
/// `None` back.
pub async fn insert_event_if_absent(
    event: NewPaymentEvent,
    match_on: DuplicateMatch,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentEvent>, sqlx::Error> {
    let payload = event.payload.map(|p| p.to_string());
    let sql = match match_on {
        DuplicateMatch::StageAndRef => {
            r#"
                INSERT INTO payment_events (order_id, stage, status, provider_ref, message, payload)
                SELECT $1, $2, $3, $4, $5, $6
                WHERE NOT EXISTS (
                    SELECT 1 FROM payment_events
                    WHERE order_id = $1 AND stage = $2 AND provider_ref = $4
                )
                RETURNING *;
            "#
        },
        DuplicateMatch::StageRefAndStatus => {
            r#"
                INSERT INTO payment_events (order_id, stage, status, provider_ref, message, payload)
                SELECT $1, $2, $3, $4, $5, $6
                WHERE NOT EXISTS (
                    SELECT 1 FROM payment_events
                    WHERE order_id = $1 AND stage = $2 AND provider_ref = $4 AND status = $3
                )
                RETURNING *;
            "#
        },
    };
    let inserted: Option<PaymentEvent> = sqlx::query_as(sql)
        .bind(event.order_id)
        .bind(event.stage)
        .bind(event.status)
        .bind(event.provider_ref)
        .bind(event.message)
        .bind(payload)
        .fetch_optional(conn)
        .await?;
    if inserted.is_none() {
        trace!("📝️ Duplicate event suppressed");
    }
    Ok(inserted)
}

pub async fn has_matching_event(
    order_id: &OrderId,
    stage: EventStage,
    provider_ref: &str,
    status: Option<PaymentStatus>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 = match status {
        Some(status) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM payment_events WHERE order_id = $1 AND stage = $2 AND provider_ref = $3 AND \
                 status = $4",
            )
            .bind(order_id)
            .bind(stage)
            .bind(provider_ref)
            .bind(status)
            .fetch_one(conn)
            .await?
        },
        None => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM payment_events WHERE order_id = $1 AND stage = $2 AND provider_ref = $3",
            )
            .bind(order_id)
            .bind(stage)
            .bind(provider_ref)
            .fetch_one(conn)
            .await?
        },
    };
    Ok(count > 0)
}

pub async fn fetch_events_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM payment_events WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
