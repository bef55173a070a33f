use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    traits::PaymentGatewayError,
};

/// Inserts a new order row using the given connection. This is not atomic on its own. [`super::super::SqliteDatabase`]
/// wraps it in a transaction together with the line items and the `*_initiate` audit event; you can do the same by
/// passing `&mut *tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                customer_name,
                customer_email,
                customer_phone,
                shipping_address,
                total_price,
                payment_provider,
                idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(order.total_price)
    .bind(order.payment_provider)
    .bind(&order.idempotency_key)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn insert_items(
    order_id: &OrderId,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    for item in items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, name, quantity, price)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_ref(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE payment_ref = $1").bind(payment_ref).fetch_optional(conn).await?;
    Ok(order)
}

/// Finds the PayPal order matching the capture id or the checkout-session id. Webhook payloads carry one or both;
/// the capture id wins when both match different orders (it is the more specific reference).
pub async fn fetch_paypal_order(
    capture_id: Option<&str>,
    paypal_order_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    if capture_id.is_none() && paypal_order_id.is_none() {
        return Ok(None);
    }
    let order = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE payment_provider = 'paypal' AND (
                ($1 IS NOT NULL AND (paypal_capture_id = $1 OR payment_ref = $1)) OR
                ($2 IS NOT NULL AND (paypal_order_id = $2 OR payment_ref = $2))
            )
            ORDER BY CASE WHEN $1 IS NOT NULL AND paypal_capture_id = $1 THEN 0 ELSE 1 END
            LIMIT 1;
        "#,
    )
    .bind(capture_id)
    .bind(paypal_order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Records the PayPal checkout-session id. It also becomes the payment reference until a capture id replaces it.
pub async fn set_paypal_order_id(
    id: &OrderId,
    paypal_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET paypal_order_id = $2, payment_ref = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(paypal_order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Records the STK checkout request id as the payment reference. A buyer may retry an order over M-Pesa after
/// abandoning a PayPal checkout, so the provider is switched here as well.
pub async fn set_mpesa_checkout_request(
    id: &OrderId,
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_ref = $2, payment_provider = 'mpesa', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Conditionally transitions the order to `paid`, advancing fulfillment to `processing` at the same time.
///
/// The `WHERE payment_status <> 'paid'` guard is what makes `paid` terminal: a second notification for the same
/// order matches zero rows and the caller sees `None` rather than a rewritten order.
pub async fn mark_paid(
    id: &OrderId,
    payment_ref: Option<&str>,
    capture_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = 'paid',
                order_status = CASE WHEN order_status = 'pending' THEN 'processing' ELSE order_status END,
                payment_ref = COALESCE($2, payment_ref),
                paypal_capture_id = COALESCE($3, paypal_capture_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(payment_ref)
    .bind(capture_id)
    .fetch_optional(conn)
    .await?;
    if let Some(o) = &order {
        debug!("📝️ Order [{}] marked as paid, fulfillment is now {}", o.id, o.order_status);
    }
    Ok(order)
}

/// Conditionally transitions the order's payment status to `failed`. Only pending orders are affected; a paid
/// order stays paid and an already-failed order is left alone.
pub async fn mark_failed(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_items_for_order(
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}
