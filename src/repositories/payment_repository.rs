use crate::error::{AppError, Result};
use crate::models::{Payment, PaymentStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, user_id, booking_id, amount, status, payment_method, transaction_id, created_at, updated_at";

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO payments ({PAYMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        ))
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Writes the gateway's terminal decision. Guarded on PENDING: a payment
    /// never changes once terminal.
    pub async fn finalize(
        conn: &mut PgConnection,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Payment> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Payment {} not found", id)))
    }

    /// All charge attempts recorded for a booking, newest first. Operator
    /// reconciliation hook for the give-up policy.
    pub async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE booking_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
