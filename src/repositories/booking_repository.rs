use crate::error::{AppError, Result};
use crate::models::{Booking, BookingStatus, SagaStep};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, user_id, room_id, check_in_date, check_out_date, quantity, total_price, status, saga_step, payment_id, created_at, updated_at";

/// Repository for bookings. Every step write is guarded by the expected
/// current step, so the orchestrator and the recovery worker serialize on the
/// row and steps only ever move forward.
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, booking: &Booking) -> Result<Booking> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings ({BOOKING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.room_id)
        .bind(booking.check_in_date)
        .bind(booking.check_out_date)
        .bind(booking.quantity)
        .bind(booking.total_price)
        .bind(booking.status)
        .bind(booking.saga_step)
        .bind(booking.payment_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Booking> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// RESERVE_SENT → RESERVE_OK, recording the price the reserve returned.
    pub async fn mark_reserve_ok(&self, id: Uuid, total_price: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET saga_step = 'RESERVE_OK', total_price = $2, updated_at = NOW()
            WHERE id = $1 AND saga_step = 'RESERVE_SENT'
            "#,
        )
        .bind(id)
        .bind(total_price)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// RESERVE_OK → PAYMENT_SENT. Written before the charge RPC. A no-op
    /// when the booking already sits at PAYMENT_SENT (recovery retry).
    pub async fn mark_payment_sent(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET saga_step = 'PAYMENT_SENT', updated_at = NOW()
            WHERE id = $1 AND saga_step IN ('RESERVE_OK', 'PAYMENT_SENT')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// PAYMENT_SENT → CONFIRMED with the payment id.
    pub async fn mark_confirmed(&self, id: Uuid, payment_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CONFIRMED', saga_step = 'CONFIRMED', payment_id = $2, updated_at = NOW()
            WHERE id = $1 AND saga_step = 'PAYMENT_SENT'
            "#,
        )
        .bind(id)
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal failure. Guarded against already-terminal rows so CONFIRMED
    /// never flaps to FAILED.
    pub async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'FAILED', saga_step = 'FAILED', updated_at = NOW()
            WHERE id = $1 AND saga_step NOT IN ('CONFIRMED', 'FAILED')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Persists an unclear outcome: the step stays where it was, only
    /// updated_at advances so the recovery worker ages it from now.
    pub async fn touch(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Mid-pipeline bookings whose updated_at has not advanced since
    /// `older_than`. The recovery worker's scan.
    pub async fn find_stuck(&self, older_than: DateTime<Utc>) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE saga_step IN ('RESERVE_SENT', 'PAYMENT_SENT')
              AND updated_at < $1
            ORDER BY updated_at
            "#,
        ))
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Backdates updated_at. Test-support hook for aging a booking past the
    /// stuck and give-up thresholds.
    pub async fn set_updated_at(&self, id: Uuid, updated_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Force a (status, saga_step) pair. Test-support hook for staging
    /// recovery scenarios.
    pub async fn set_state(
        &self,
        id: Uuid,
        status: BookingStatus,
        saga_step: SagaStep,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, saga_step = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(saga_step)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
