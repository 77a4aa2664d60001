use crate::error::{AppError, Result};
use crate::models::ReservationHold;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for reservation holds. A hold row is the proof that stock was
/// decremented for its (booking, room, date) and not yet finalized.
pub struct HoldRepository {
    pool: PgPool,
}

impl HoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(conn: &mut PgConnection, hold: &ReservationHold) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservation_holds (id, booking_id, room_id, availability_date, quantity, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(hold.id)
        .bind(hold.booking_id)
        .bind(hold.room_id)
        .bind(hold.availability_date)
        .bind(hold.quantity)
        .bind(hold.expires_at)
        .bind(hold.created_at)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<ReservationHold>> {
        let rows = sqlx::query_as::<_, ReservationHold>(
            r#"
            SELECT id, booking_id, room_id, availability_date, quantity, expires_at, created_at
            FROM reservation_holds
            WHERE booking_id = $1
            ORDER BY availability_date
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Locks and returns a booking's holds inside the caller's transaction.
    /// Release is keyed off these rows, so taking them FOR UPDATE serializes
    /// release against confirm and the reaper.
    pub async fn lock_by_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> Result<Vec<ReservationHold>> {
        let rows = sqlx::query_as::<_, ReservationHold>(
            r#"
            SELECT id, booking_id, room_id, availability_date, quantity, expires_at, created_at
            FROM reservation_holds
            WHERE booking_id = $1
            ORDER BY availability_date
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_all(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn delete_by_booking(conn: &mut PgConnection, booking_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservation_holds
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Deletes one hold if still present. The reaper's guard against a
    /// concurrent confirm/release that already removed it.
    pub async fn delete_by_id(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservation_holds
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<ReservationHold>> {
        let rows = sqlx::query_as::<_, ReservationHold>(
            r#"
            SELECT id, booking_id, room_id, availability_date, quantity, expires_at, created_at
            FROM reservation_holds
            WHERE expires_at < $1
            ORDER BY expires_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
