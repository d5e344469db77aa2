//! Order persistence
//!
//! The paid transition is a conditional update keyed on `is_paid`, so the
//! webhook and the polling client can race freely: exactly one of them
//! observes the flip and runs the post-payment work.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::order::{Address, Order, OrderStatus};

pub async fn insert(pool: &PgPool, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, items, shipping_address, payment_method, \
         items_price, shipping_price, tax_price, total_amount, status, payment_status, is_paid, \
         paid_at, is_delivered, delivered_at, payment_session_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.items)
    .bind(&order.shipping_address)
    .bind(&order.payment_method)
    .bind(order.items_price)
    .bind(order.shipping_price)
    .bind(order.tax_price)
    .bind(order.total_amount)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.is_paid)
    .bind(order.paid_at)
    .bind(order.is_delivered)
    .bind(order.delivered_at)
    .bind(&order.payment_session_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(pool)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok((orders, total.0))
}

pub async fn list_all(
    pool: &PgPool,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(pool)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(pool).await?;
    Ok((orders, total.0))
}

/// Delete an order that never left `pending`/unpaid. Returns false when the
/// order has moved on (or is gone).
pub async fn delete_pending(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM orders WHERE id = $1 AND status = 'pending' AND is_paid = FALSE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Flip an order to paid exactly once. `Some(order)` means this caller won
/// the transition and owns the post-payment work; `None` means the order
/// was already paid (or does not exist; callers that care fetch it).
pub async fn mark_paid_if_unpaid(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'paid', payment_status = 'paid', is_paid = TRUE, \
         paid_at = $2, updated_at = $2 \
         WHERE id = $1 AND is_paid = FALSE \
         RETURNING *",
    )
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
}

pub async fn set_payment_session(
    pool: &PgPool,
    id: Uuid,
    session_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET payment_session_id = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_shipping_address(
    pool: &PgPool,
    id: Uuid,
    address: &Address,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET shipping_address = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(sqlx::types::Json(address))
        .execute(pool)
        .await?;
    Ok(())
}

/// Deliver is a paired write: flag and timestamp move together, and only a
/// paid order can be delivered.
pub async fn mark_delivered(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'delivered', is_delivered = TRUE, delivered_at = $2, \
         updated_at = $2 \
         WHERE id = $1 AND is_paid = TRUE AND is_delivered = FALSE \
         RETURNING *",
    )
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: OrderStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}
