//! Payment rows attached to placed orders.

use sqlx::{PgConnection, PgPool};

use shoppingify_core::{OrderId, PaymentId, PaymentMethod, PaymentStatus};

use super::RepositoryError;
use crate::models::order::Payment;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: i32,
    method: PaymentMethod,
    status: PaymentStatus,
    external_id: Option<String>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: PaymentId::new(row.id),
            order_id: OrderId::new(row.order_id),
            method: row.method,
            status: row.status,
            external_id: row.external_id,
        }
    }
}

/// Repository for gateway callbacks.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Mark the payment for a gateway intent as succeeded.
    ///
    /// Returns the order id, or `None` when no payment carries this id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_succeeded(
        &self,
        external_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let order_id: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE payments SET status = 'succeeded', updated_at = NOW()
            WHERE external_id = $1
            RETURNING order_id
            ",
        )
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order_id.map(OrderId::new))
    }
}

/// The payment attached to an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Payment>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, order_id, method, status, external_id FROM payments WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Payment::from))
}

/// Record the payment for an order being placed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn create(
    conn: &mut PgConnection,
    order_id: OrderId,
    method: PaymentMethod,
    status: PaymentStatus,
    external_id: Option<&str>,
) -> Result<Payment, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r"
        INSERT INTO payments (order_id, method, status, external_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (order_id) DO UPDATE
        SET method = EXCLUDED.method,
            status = EXCLUDED.status,
            external_id = EXCLUDED.external_id,
            updated_at = NOW()
        RETURNING id, order_id, method, status, external_id
        ",
    )
    .bind(order_id)
    .bind(method)
    .bind(status)
    .bind(external_id)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}
