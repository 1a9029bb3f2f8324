use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderPaymentUpdate},
    traits::{PaymentUpdateOutcome, StorageError},
};

/// Returns the order with the given id, if any.
pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Applies a reconciliation write as a single conditional update.
///
/// The `WHERE` clause encodes the one-way transition law: the row is only touched when the current status
/// is `Pending`, or when the incoming status merely re-asserts the current one (idempotent redelivery).
/// Doing the check inside the statement — instead of read-then-write — means two concurrent duplicate
/// deliveries cannot interleave into a lost update or a regression.
pub async fn apply_payment_update(
    id: OrderId,
    update: OrderPaymentUpdate,
    conn: &mut SqliteConnection,
) -> Result<PaymentUpdateOutcome, StorageError> {
    let new_status = update.status.to_string();
    trace!("🗃️ Applying payment update to order {id}: status={new_status}, payment_id={}", update.payment_id);
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = $1,
                payment_id = $2,
                preference_id = COALESCE($3, preference_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND (status = 'Pending' OR status = $1)
            RETURNING *;
        "#,
    )
    .bind(&new_status)
    .bind(&update.payment_id)
    .bind(&update.preference_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok(PaymentUpdateOutcome::Applied(order)),
        None => match fetch_order(id, conn).await? {
            Some(order) => Ok(PaymentUpdateOutcome::Forbidden { current: order.status }),
            None => Ok(PaymentUpdateOutcome::NotFound),
        },
    }
}

/// Records the checkout preference id for an order.
pub async fn set_preference_id(
    id: OrderId,
    preference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    let result =
        sqlx::query("UPDATE orders SET preference_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(preference_id)
            .bind(id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(format!("Order {id} does not exist")));
    }
    Ok(())
}

/// Inserts a new order. Order intake belongs to the surrounding marketplace; this exists for seeding and
/// integration tests.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorageError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (vendor_id, buyer_id, total_price, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order.vendor_id)
    .bind(order.buyer_id)
    .bind(order.total_price)
    .bind(order.currency)
    .fetch_one(conn)
    .await?;
    Ok(order)
}
