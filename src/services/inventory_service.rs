use crate::config::BookingSettings;
use crate::error::{AppError, Result};
use crate::idempotency::IdempotencyStore;
use crate::locking::{
    reservation_lock_key, RedisLockProvider, ReservationStrategyKind,
};
use crate::models::{nightly_dates, parse_saga_key, ReservationHold, RoomAvailability};
use crate::observability::get_metrics;
use crate::repositories::{AvailabilityRepository, HoldRepository};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Status string memoized in reserve responses.
pub const RESERVED: &str = "RESERVED";

const OPTIMISTIC_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveResponse {
    pub reservation_id: Uuid,
    pub total_price: Decimal,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub booking_id: Option<Uuid>,
}

/// Inventory core: guarded atomic decrement, reservation holds, idempotent
/// reserve. Owns room_availability, reservation_holds and the inventory
/// idempotency store.
pub struct InventoryService {
    pool: PgPool,
    availability: AvailabilityRepository,
    holds: HoldRepository,
    idempotency: Arc<IdempotencyStore>,
    locks: RedisLockProvider,
    strategy: ReservationStrategyKind,
    hold_ttl: chrono::Duration,
    lock_wait: Duration,
    lock_lease: Duration,
}

impl InventoryService {
    pub fn new(
        pool: PgPool,
        idempotency: Arc<IdempotencyStore>,
        locks: RedisLockProvider,
        settings: &BookingSettings,
    ) -> Self {
        Self {
            availability: AvailabilityRepository::new(pool.clone()),
            holds: HoldRepository::new(pool.clone()),
            pool,
            idempotency,
            locks,
            strategy: settings.reservation_strategy,
            hold_ttl: settings.hold_ttl(),
            lock_wait: settings.lock_wait(),
            lock_lease: settings.lock_lease(),
        }
    }

    /// Reserves `quantity` rooms for every night of the stay, atomically per
    /// date, memoizing the response under the idempotency key.
    pub async fn reserve(&self, request: ReserveRequest) -> Result<ReserveResponse> {
        validate_stay(request.check_in_date, request.check_out_date, request.quantity)?;

        if let Some(key) = &request.idempotency_key {
            if let Some(cached) = self.idempotency.lookup::<ReserveResponse>(key).await? {
                debug!(key, "Reserve request replayed from idempotency store");
                get_metrics().record_idempotent_replay("inventory");
                return Ok(cached);
            }
        }

        let dates = nightly_dates(request.check_in_date, request.check_out_date);

        let result = match self.strategy {
            ReservationStrategyKind::DistributedLock => {
                let key = reservation_lock_key(request.room_id, dates[0]);
                let guard = self.locks.acquire(&key, self.lock_wait, self.lock_lease).await?;
                let result = self.reserve_in_tx(&request, &dates, false).await;
                guard.release().await;
                result
            }
            ReservationStrategyKind::PessimisticRowLock => {
                self.reserve_in_tx(&request, &dates, true).await
            }
            ReservationStrategyKind::OptimisticVersion => {
                self.reserve_optimistic(&request, &dates).await
            }
        };

        match &result {
            Ok(response) => {
                info!(
                    room_id = %request.room_id,
                    nights = dates.len(),
                    quantity = request.quantity,
                    total_price = %response.total_price,
                    "Reservation placed"
                );
                get_metrics().record_reservation(dates.len() as u64);
            }
            Err(AppError::InsufficientAvailability { room_id, date }) => {
                info!(room_id = %room_id, date = %date, "Reserve rejected, insufficient availability");
                get_metrics().record_oversell_rejection();
            }
            Err(_) => {}
        }

        result
    }

    /// One transaction covering the guarded decrements, the holds, and the
    /// idempotency memo. Nothing user-visible survives without its memo.
    async fn reserve_in_tx(
        &self,
        request: &ReserveRequest,
        dates: &[NaiveDate],
        row_lock: bool,
    ) -> Result<ReserveResponse> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        if row_lock {
            AvailabilityRepository::lock_rows(
                &mut tx,
                request.room_id,
                request.check_in_date,
                request.check_out_date,
            )
            .await?;
        }

        let mut total_price = Decimal::ZERO;
        for date in dates {
            let row = AvailabilityRepository::find_in_tx(&mut tx, request.room_id, *date)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Room {} has no availability on {}",
                        request.room_id, date
                    ))
                })?;

            let decremented =
                AvailabilityRepository::try_decrement(&mut tx, request.room_id, *date, request.quantity)
                    .await?;
            if !decremented {
                // Dropping the transaction rolls back earlier dates.
                return Err(AppError::InsufficientAvailability {
                    room_id: request.room_id,
                    date: *date,
                });
            }

            total_price += row.price_per_night * Decimal::from(request.quantity);
        }

        let response = ReserveResponse {
            reservation_id: Uuid::new_v4(),
            total_price,
            status: RESERVED.to_string(),
        };

        if let Some(key) = &request.idempotency_key {
            if let Some(booking_id) = parse_saga_key(key) {
                for date in dates {
                    let hold = ReservationHold::new(
                        booking_id,
                        request.room_id,
                        *date,
                        request.quantity,
                        self.hold_ttl,
                    );
                    HoldRepository::insert(&mut tx, &hold).await?;
                }
            }

            let won = self.idempotency.record(&mut tx, key, &response).await?;
            if !won {
                // A concurrent request with this key committed first. Give up
                // our effect and answer with the winner's memo.
                tx.rollback().await.map_err(AppError::Database)?;
                return self.idempotency.reread(key).await;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;

        if let Some(key) = &request.idempotency_key {
            self.idempotency.warm(key, &response).await;
        }

        Ok(response)
    }

    /// Optimistic variant: snapshot versions, decrement with a version guard,
    /// retry the whole stay on a version miss.
    async fn reserve_optimistic(
        &self,
        request: &ReserveRequest,
        dates: &[NaiveDate],
    ) -> Result<ReserveResponse> {
        for attempt in 0..OPTIMISTIC_RETRY_LIMIT {
            match self.reserve_optimistic_once(request, dates).await {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {
                    debug!(attempt, room_id = %request.room_id, "Version conflict, retrying reserve");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(AppError::LockTimeout(format!(
            "room {} contended past {} optimistic attempts",
            request.room_id, OPTIMISTIC_RETRY_LIMIT
        )))
    }

    async fn reserve_optimistic_once(
        &self,
        request: &ReserveRequest,
        dates: &[NaiveDate],
    ) -> Result<Option<ReserveResponse>> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let mut total_price = Decimal::ZERO;
        for date in dates {
            let row = AvailabilityRepository::find_in_tx(&mut tx, request.room_id, *date)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Room {} has no availability on {}",
                        request.room_id, date
                    ))
                })?;

            if row.available_count < request.quantity {
                return Err(AppError::InsufficientAvailability {
                    room_id: request.room_id,
                    date: *date,
                });
            }

            let decremented = AvailabilityRepository::try_decrement_versioned(
                &mut tx,
                request.room_id,
                *date,
                request.quantity,
                row.version,
            )
            .await?;
            if !decremented {
                tx.rollback().await.map_err(AppError::Database)?;
                return Ok(None);
            }

            total_price += row.price_per_night * Decimal::from(request.quantity);
        }

        let response = ReserveResponse {
            reservation_id: Uuid::new_v4(),
            total_price,
            status: RESERVED.to_string(),
        };

        if let Some(key) = &request.idempotency_key {
            if let Some(booking_id) = parse_saga_key(key) {
                for date in dates {
                    let hold = ReservationHold::new(
                        booking_id,
                        request.room_id,
                        *date,
                        request.quantity,
                        self.hold_ttl,
                    );
                    HoldRepository::insert(&mut tx, &hold).await?;
                }
            }

            let won = self.idempotency.record(&mut tx, key, &response).await?;
            if !won {
                tx.rollback().await.map_err(AppError::Database)?;
                return Ok(Some(self.idempotency.reread(key).await?));
            }
        }

        tx.commit().await.map_err(AppError::Database)?;

        if let Some(key) = &request.idempotency_key {
            self.idempotency.warm(key, &response).await;
        }

        Ok(Some(response))
    }

    /// Deletes every hold for the booking. Second call is a no-op.
    pub async fn confirm_reservation(&self, booking_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let deleted = HoldRepository::delete_by_booking(&mut tx, booking_id).await?;
        tx.commit().await.map_err(AppError::Database)?;

        debug!(booking_id = %booking_id, deleted, "Reservation confirmed, holds cleared");
        Ok(deleted)
    }

    /// Compensation. With a booking_id the credit is keyed off hold
    /// existence, making repeated calls no-ops. Without one the increment is
    /// unconditional and the caller owns not invoking it twice.
    pub async fn release(&self, request: ReleaseRequest) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let credited = match request.booking_id {
            Some(booking_id) => {
                let holds = HoldRepository::lock_by_booking(&mut tx, booking_id).await?;
                if holds.is_empty() {
                    debug!(booking_id = %booking_id, "Release found no holds, nothing to credit");
                }
                let mut credited = 0u64;
                for hold in &holds {
                    AvailabilityRepository::credit(
                        &mut tx,
                        hold.room_id,
                        hold.availability_date,
                        hold.quantity,
                    )
                    .await?;
                    HoldRepository::delete_by_id(&mut tx, hold.id).await?;
                    credited += 1;
                }
                credited
            }
            None => {
                let dates = nightly_dates(request.check_in_date, request.check_out_date);
                for date in &dates {
                    AvailabilityRepository::credit(&mut tx, request.room_id, *date, request.quantity)
                        .await?;
                }
                dates.len() as u64
            }
        };

        tx.commit().await.map_err(AppError::Database)?;

        if credited > 0 {
            info!(
                room_id = %request.room_id,
                booking_id = ?request.booking_id,
                credited,
                "Inventory released"
            );
            get_metrics().record_release(credited);
        }
        Ok(credited)
    }

    /// Stale availability view for the catalog surface.
    pub async fn availability(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>> {
        self.availability.find_range(room_id, from, to).await
    }

    /// Catalog seeding: set stock and price for each night of the range.
    pub async fn seed(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        available_count: i32,
        price_per_night: Decimal,
    ) -> Result<u64> {
        if available_count < 0 {
            return Err(AppError::Validation(
                "available_count must not be negative".to_string(),
            ));
        }
        if price_per_night < Decimal::ZERO {
            return Err(AppError::Validation(
                "price_per_night must not be negative".to_string(),
            ));
        }

        let dates = nightly_dates(from, to);
        if dates.is_empty() {
            return Err(AppError::Validation(
                "date range must cover at least one night".to_string(),
            ));
        }
        for date in &dates {
            self.availability
                .seed(room_id, *date, available_count, price_per_night)
                .await?;
        }
        Ok(dates.len() as u64)
    }

    /// Expired-hold sweep: credit the stock back, then drop the hold. Run by
    /// the reaper on its interval; no RPCs.
    pub async fn reap_expired_holds(&self) -> Result<u64> {
        let expired = self.holds.find_expired(chrono::Utc::now()).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut reaped = 0u64;
        for hold in &expired {
            let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
            // The row may be gone if confirm or release won the race after
            // our snapshot; only credit when we actually deleted it.
            let deleted = HoldRepository::delete_by_id(&mut tx, hold.id).await?;
            if deleted {
                AvailabilityRepository::credit(
                    &mut tx,
                    hold.room_id,
                    hold.availability_date,
                    hold.quantity,
                )
                .await?;
                reaped += 1;
            }
            tx.commit().await.map_err(AppError::Database)?;
        }

        if reaped > 0 {
            warn!(reaped, "Expired reservation holds reclaimed");
            get_metrics().record_holds_reaped(reaped);
        }
        Ok(reaped)
    }
}

fn validate_stay(check_in: NaiveDate, check_out: NaiveDate, quantity: i32) -> Result<()> {
    if check_out <= check_in {
        return Err(AppError::Validation(
            "check_out_date must be after check_in_date".to_string(),
        ));
    }
    if quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_validation_rejects_inverted_range_and_zero_quantity() {
        let check_in = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(validate_stay(check_in, check_out, 1).is_err());
        assert!(validate_stay(check_out, check_in, 0).is_err());
        assert!(validate_stay(check_out, check_in, 2).is_ok());
    }
}
