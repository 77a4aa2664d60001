use crate::error::{AppError, Result};
use crate::models::RoomAvailability;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for per-(room, date) stock. Writes go through the guarded
/// decrement or the explicit credit; anything else would break conservation.
pub struct AvailabilityRepository {
    pool: PgPool,
}

impl AvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seeds or replaces the stock row for one (room, date).
    pub async fn seed(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        available_count: i32,
        price_per_night: Decimal,
    ) -> Result<RoomAvailability> {
        let row = sqlx::query_as::<_, RoomAvailability>(
            r#"
            INSERT INTO room_availability (room_id, availability_date, available_count, price_per_night, version)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (room_id, availability_date)
            DO UPDATE SET available_count = EXCLUDED.available_count,
                          price_per_night = EXCLUDED.price_per_night,
                          version = room_availability.version + 1
            RETURNING room_id, availability_date, available_count, price_per_night, version
            "#,
        )
        .bind(room_id)
        .bind(date)
        .bind(available_count)
        .bind(price_per_night)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find(&self, room_id: Uuid, date: NaiveDate) -> Result<Option<RoomAvailability>> {
        let row = sqlx::query_as::<_, RoomAvailability>(
            r#"
            SELECT room_id, availability_date, available_count, price_per_night, version
            FROM room_availability
            WHERE room_id = $1 AND availability_date = $2
            "#,
        )
        .bind(room_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Stale-read of a date range, ascending. Used by the availability view;
    /// never by the reserve critical section.
    pub async fn find_range(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>> {
        let rows = sqlx::query_as::<_, RoomAvailability>(
            r#"
            SELECT room_id, availability_date, available_count, price_per_night, version
            FROM room_availability
            WHERE room_id = $1 AND availability_date >= $2 AND availability_date < $3
            ORDER BY availability_date
            "#,
        )
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Reads one stock row inside the caller's transaction.
    pub async fn find_in_tx(
        conn: &mut PgConnection,
        room_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<RoomAvailability>> {
        let row = sqlx::query_as::<_, RoomAvailability>(
            r#"
            SELECT room_id, availability_date, available_count, price_per_night, version
            FROM room_availability
            WHERE room_id = $1 AND availability_date = $2
            "#,
        )
        .bind(room_id)
        .bind(date)
        .fetch_optional(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Takes row locks on the stay's dates, ascending. Pessimistic strategy
    /// only.
    pub async fn lock_rows(
        conn: &mut PgConnection,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>> {
        let rows = sqlx::query_as::<_, RoomAvailability>(
            r#"
            SELECT room_id, availability_date, available_count, price_per_night, version
            FROM room_availability
            WHERE room_id = $1 AND availability_date >= $2 AND availability_date < $3
            ORDER BY availability_date
            FOR UPDATE
            "#,
        )
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// The single guarded decrement. Returns true when exactly one row was
    /// updated, false when the guard `available_count >= quantity` rejected
    /// the write.
    pub async fn try_decrement(
        conn: &mut PgConnection,
        room_id: Uuid,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE room_availability
            SET available_count = available_count - $3,
                version = version + 1
            WHERE room_id = $1 AND availability_date = $2 AND available_count >= $3
            "#,
        )
        .bind(room_id)
        .bind(date)
        .bind(quantity)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Version-guarded decrement for the optimistic strategy. The stock guard
    /// still applies; the version guard detects concurrent writers.
    pub async fn try_decrement_versioned(
        conn: &mut PgConnection,
        room_id: Uuid,
        date: NaiveDate,
        quantity: i32,
        expected_version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE room_availability
            SET available_count = available_count - $3,
                version = version + 1
            WHERE room_id = $1 AND availability_date = $2
              AND available_count >= $3 AND version = $4
            "#,
        )
        .bind(room_id)
        .bind(date)
        .bind(quantity)
        .bind(expected_version)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Credits stock back during release or hold expiry.
    pub async fn credit(
        conn: &mut PgConnection,
        room_id: Uuid,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE room_availability
            SET available_count = available_count + $3,
                version = version + 1
            WHERE room_id = $1 AND availability_date = $2
            "#,
        )
        .bind(room_id)
        .bind(date)
        .bind(quantity)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
