use crate::clients::{InventoryApi, PaymentApi, RemoteError};
use crate::error::{AppError, Result};
use crate::events::EventProducer;
use crate::models::{Booking, PaymentStatus};
use crate::observability::get_metrics;
use crate::repositories::BookingRepository;
use crate::services::{ChargeRequest, ReleaseRequest, ReserveRequest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAYMENT_METHOD: &str = "CREDIT_CARD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingCommand {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub payment_method: Option<String>,
}

/// What one pass through the pipeline produced. PendingUnclear is a result,
/// not an error: the booking stays at its last written step and recovery
/// owns it from here.
#[derive(Debug)]
pub enum SagaOutcome {
    Confirmed(Booking),
    BusinessFailure {
        booking: Booking,
        code: String,
        message: String,
    },
    PendingUnclear(Booking),
}

/// The saga orchestrator. Owns the bookings table and drives
/// reserve → charge → confirm, writing the intended step before and the
/// completed step after every remote effect.
pub struct BookingService {
    bookings: BookingRepository,
    inventory: Arc<dyn InventoryApi>,
    payment: Arc<dyn PaymentApi>,
    events: Arc<EventProducer>,
}

impl BookingService {
    pub fn new(
        pool: PgPool,
        inventory: Arc<dyn InventoryApi>,
        payment: Arc<dyn PaymentApi>,
        events: Arc<EventProducer>,
    ) -> Self {
        Self {
            bookings: BookingRepository::new(pool),
            inventory,
            payment,
            events,
        }
    }

    pub fn repository(&self) -> &BookingRepository {
        &self.bookings
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        self.bookings.find_by_id(id).await
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.bookings.find_by_user(user_id).await
    }

    /// Runs the whole pipeline for a new booking.
    pub async fn create_booking(&self, command: CreateBookingCommand) -> Result<SagaOutcome> {
        if command.check_out_date <= command.check_in_date {
            return Err(AppError::Validation(
                "check_out_date must be after check_in_date".to_string(),
            ));
        }
        if command.quantity <= 0 {
            return Err(AppError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        // Persisted in PENDING / RESERVE_SENT before any remote call, so a
        // crash from here on leaves a row the recovery worker can see.
        let booking = Booking::new(
            command.user_id,
            command.room_id,
            command.check_in_date,
            command.check_out_date,
            command.quantity,
        );
        let booking = self.bookings.create(&booking).await?;
        let key = booking.idempotency_key();
        get_metrics().record_booking_created();

        info!(booking_id = %booking.id, room_id = %booking.room_id, "Saga started");

        let reserve = ReserveRequest {
            room_id: booking.room_id,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            quantity: booking.quantity,
            idempotency_key: Some(key.clone()),
        };

        let total_price = match self.inventory.reserve(&reserve).await {
            Ok(response) => response.total_price,
            Err(RemoteError::Clear { code, message }) => {
                return self.fail_with_compensation(&booking, code, message).await;
            }
            Err(RemoteError::Unclear(reason)) => {
                return self.leave_pending(&booking, "reserve", &reason).await;
            }
        };

        self.bookings.mark_reserve_ok(booking.id, total_price).await?;

        // Intent is durable before the charge leaves the process.
        self.bookings.mark_payment_sent(booking.id).await?;

        let charge = ChargeRequest {
            user_id: booking.user_id,
            booking_id: booking.id,
            amount: total_price,
            payment_method: command
                .payment_method
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            idempotency_key: Some(key.clone()),
        };

        match self.payment.charge(&charge).await {
            Ok(response) if response.status == PaymentStatus::Success => {
                self.finalize_confirmed(&booking, response.payment_id, false)
                    .await
            }
            Ok(response) => {
                // A FAILED charge is a definite decline.
                self.fail_with_compensation(
                    &booking,
                    "PAYMENT_DECLINED".to_string(),
                    response.message,
                )
                .await
            }
            Err(RemoteError::Clear { code, message }) => {
                self.fail_with_compensation(&booking, code, message).await
            }
            Err(RemoteError::Unclear(reason)) => {
                self.leave_pending(&booking, "charge", &reason).await
            }
        }
    }

    /// Charge succeeded: clear the holds, flip to CONFIRMED, publish.
    async fn finalize_confirmed(
        &self,
        booking: &Booking,
        payment_id: Uuid,
        recovery_confirmed: bool,
    ) -> Result<SagaOutcome> {
        if let Err(e) = self.inventory.confirm(booking.id).await {
            // Money is taken but the holds still stand. Leave the step at
            // PAYMENT_SENT; recovery replays the charge memo and retries
            // this confirm.
            return self
                .leave_pending(booking, "confirm", &e.to_string())
                .await;
        }

        self.bookings.mark_confirmed(booking.id, payment_id).await?;
        let confirmed = self.bookings.find_by_id(booking.id).await?;

        if let Err(e) = self
            .events
            .publish_booking_confirmed(&confirmed, recovery_confirmed)
            .await
        {
            // At-least-once with consumer dedup; a lost publish is an
            // operational gap, not a booking failure.
            error!(booking_id = %confirmed.id, error = %e, "BookingConfirmed publish failed");
        }

        info!(booking_id = %confirmed.id, recovery_confirmed, "Booking confirmed");
        get_metrics().record_booking_confirmed(recovery_confirmed);
        Ok(SagaOutcome::Confirmed(confirmed))
    }

    /// Clear failure: compensate, then mark FAILED.
    async fn fail_with_compensation(
        &self,
        booking: &Booking,
        code: String,
        message: String,
    ) -> Result<SagaOutcome> {
        self.compensate(booking).await;
        self.bookings.mark_failed(booking.id).await?;
        let failed = self.bookings.find_by_id(booking.id).await?;

        warn!(booking_id = %failed.id, code = %code, "Booking failed: {}", message);
        get_metrics().record_booking_failed(&code);
        Ok(SagaOutcome::BusinessFailure {
            booking: failed,
            code,
            message,
        })
    }

    /// Release keyed by booking_id: a no-op when no holds exist, so invoking
    /// it for a reserve that never landed is safe. Failure here is logged and
    /// swallowed; the hold TTL bounds the leak.
    async fn compensate(&self, booking: &Booking) {
        let release = ReleaseRequest {
            room_id: booking.room_id,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            quantity: booking.quantity,
            booking_id: Some(booking.id),
        };
        if let Err(e) = self.inventory.release(&release).await {
            error!(
                booking_id = %booking.id,
                error = %e,
                "Compensation release failed; expired-hold reaper will reclaim the stock"
            );
        }
    }

    /// Unclear outcome: persist the booking with its step untouched and hand
    /// the caller a PendingUnclear. Recovery picks it up once it ages past
    /// the stuck threshold.
    async fn leave_pending(
        &self,
        booking: &Booking,
        stage: &str,
        reason: &str,
    ) -> Result<SagaOutcome> {
        warn!(
            booking_id = %booking.id,
            stage,
            reason,
            "Remote outcome unclear, leaving saga for recovery"
        );
        self.bookings.touch(booking.id).await?;
        let pending = self.bookings.find_by_id(booking.id).await?;
        get_metrics().record_booking_pending_unclear();
        Ok(SagaOutcome::PendingUnclear(pending))
    }
}
