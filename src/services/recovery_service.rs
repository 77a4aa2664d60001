use crate::clients::{InventoryApi, PaymentApi, RemoteError};
use crate::config::BookingSettings;
use crate::error::Result;
use crate::events::EventProducer;
use crate::models::{Booking, PaymentStatus, SagaStep};
use crate::observability::get_metrics;
use crate::repositories::BookingRepository;
use crate::services::booking_service::DEFAULT_PAYMENT_METHOD;
use crate::services::{ChargeRequest, ReleaseRequest, ReserveRequest};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the worker did with one stuck booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Confirmed,
    Failed,
    /// Outcome still unclear; untouched, next tick tries again.
    Left,
    GaveUp,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryStats {
    pub scanned: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub left: u64,
    pub gave_up: u64,
}

/// Walks stuck sagas forward. Retries carry the booking's original
/// idempotency key, so a step that actually landed the first time replays
/// from the memo instead of double-firing.
pub struct RecoveryService {
    bookings: BookingRepository,
    inventory: Arc<dyn InventoryApi>,
    payment: Arc<dyn PaymentApi>,
    events: Arc<EventProducer>,
    stuck_threshold: chrono::Duration,
    give_up_threshold: chrono::Duration,
}

impl RecoveryService {
    pub fn new(
        pool: PgPool,
        inventory: Arc<dyn InventoryApi>,
        payment: Arc<dyn PaymentApi>,
        events: Arc<EventProducer>,
        settings: &BookingSettings,
    ) -> Self {
        Self {
            bookings: BookingRepository::new(pool),
            inventory,
            payment,
            events,
            stuck_threshold: settings.stuck_threshold(),
            give_up_threshold: settings.give_up_threshold(),
        }
    }

    /// One scan. Errors on individual bookings are logged and do not stop
    /// the sweep.
    pub async fn run_once(&self) -> Result<RecoveryStats> {
        let now = Utc::now();
        let stuck = self.bookings.find_stuck(now - self.stuck_threshold).await?;

        let mut stats = RecoveryStats {
            scanned: stuck.len() as u64,
            ..Default::default()
        };

        for booking in &stuck {
            let past_give_up = booking.updated_at < now - self.give_up_threshold;
            let outcome = if past_give_up {
                self.give_up(booking).await
            } else {
                self.advance_stuck(booking).await
            };

            match outcome {
                Ok(RecoveryAction::Confirmed) => stats.confirmed += 1,
                Ok(RecoveryAction::Failed) => stats.failed += 1,
                Ok(RecoveryAction::Left) => stats.left += 1,
                Ok(RecoveryAction::GaveUp) => stats.gave_up += 1,
                Err(e) => {
                    error!(booking_id = %booking.id, error = %e, "Recovery pass failed for booking");
                    stats.left += 1;
                }
            }
        }

        if stats.scanned > 0 {
            info!(
                scanned = stats.scanned,
                confirmed = stats.confirmed,
                failed = stats.failed,
                left = stats.left,
                gave_up = stats.gave_up,
                "Recovery sweep finished"
            );
        }
        Ok(stats)
    }

    /// Replays the saga from the booking's recorded step with the original
    /// idempotency key. Unclear outcomes leave the row untouched so the next
    /// tick sees the same age.
    pub async fn advance_stuck(&self, booking: &Booking) -> Result<RecoveryAction> {
        let key = booking.idempotency_key();

        match booking.saga_step {
            SagaStep::ReserveSent => {
                let reserve = ReserveRequest {
                    room_id: booking.room_id,
                    check_in_date: booking.check_in_date,
                    check_out_date: booking.check_out_date,
                    quantity: booking.quantity,
                    idempotency_key: Some(key.clone()),
                };
                match self.inventory.reserve(&reserve).await {
                    Ok(response) => {
                        self.bookings
                            .mark_reserve_ok(booking.id, response.total_price)
                            .await?;
                        let advanced = self.bookings.find_by_id(booking.id).await?;
                        self.retry_charge(&advanced, &key).await
                    }
                    Err(RemoteError::Clear { code, message }) => {
                        self.compensate_and_fail(booking, &code, &message).await
                    }
                    Err(RemoteError::Unclear(reason)) => {
                        info!(booking_id = %booking.id, reason, "Reserve still unclear, leaving for next tick");
                        Ok(RecoveryAction::Left)
                    }
                }
            }
            SagaStep::ReserveOk | SagaStep::PaymentSent => {
                self.retry_charge(booking, &key).await
            }
            _ => Ok(RecoveryAction::Left),
        }
    }

    async fn retry_charge(&self, booking: &Booking, key: &str) -> Result<RecoveryAction> {
        self.bookings.mark_payment_sent(booking.id).await?;

        let charge = ChargeRequest {
            user_id: booking.user_id,
            booking_id: booking.id,
            amount: booking.total_price,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
            idempotency_key: Some(key.to_string()),
        };

        match self.payment.charge(&charge).await {
            Ok(response) if response.status == PaymentStatus::Success => {
                if let Err(e) = self.inventory.confirm(booking.id).await {
                    warn!(booking_id = %booking.id, error = %e, "Confirm failed after recovered charge, retrying next tick");
                    return Ok(RecoveryAction::Left);
                }
                self.bookings
                    .mark_confirmed(booking.id, response.payment_id)
                    .await?;
                let confirmed = self.bookings.find_by_id(booking.id).await?;

                if let Err(e) = self.events.publish_booking_confirmed(&confirmed, true).await {
                    error!(booking_id = %confirmed.id, error = %e, "BookingConfirmed publish failed");
                }

                info!(booking_id = %confirmed.id, "Stuck booking confirmed by recovery");
                get_metrics().record_booking_confirmed(true);
                get_metrics().record_recovery_action("confirmed");
                Ok(RecoveryAction::Confirmed)
            }
            Ok(response) => {
                self.compensate_and_fail(booking, "PAYMENT_DECLINED", &response.message)
                    .await
            }
            Err(RemoteError::Clear { code, message }) => {
                self.compensate_and_fail(booking, &code, &message).await
            }
            Err(RemoteError::Unclear(reason)) => {
                info!(booking_id = %booking.id, reason, "Charge still unclear, leaving for next tick");
                Ok(RecoveryAction::Left)
            }
        }
    }

    async fn compensate_and_fail(
        &self,
        booking: &Booking,
        code: &str,
        message: &str,
    ) -> Result<RecoveryAction> {
        let release = ReleaseRequest {
            room_id: booking.room_id,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            quantity: booking.quantity,
            booking_id: Some(booking.id),
        };
        if let Err(e) = self.inventory.release(&release).await {
            error!(booking_id = %booking.id, error = %e, "Release during recovery failed; reaper will reclaim");
        }

        self.bookings.mark_failed(booking.id).await?;
        warn!(booking_id = %booking.id, code, "Stuck booking failed by recovery: {}", message);
        get_metrics().record_booking_failed(code);
        get_metrics().record_recovery_action("failed");
        Ok(RecoveryAction::Failed)
    }

    /// Terminal action for a saga stuck past the give-up threshold. The
    /// policy is asymmetric: at RESERVE_SENT no money moved, so release and
    /// fail; at PAYMENT_SENT the charge may have landed, so the stock is
    /// never auto-credited and the row is flagged for operator
    /// reconciliation instead.
    pub async fn give_up(&self, booking: &Booking) -> Result<RecoveryAction> {
        match booking.saga_step {
            SagaStep::ReserveSent => {
                let release = ReleaseRequest {
                    room_id: booking.room_id,
                    check_in_date: booking.check_in_date,
                    check_out_date: booking.check_out_date,
                    quantity: booking.quantity,
                    booking_id: Some(booking.id),
                };
                if let Err(e) = self.inventory.release(&release).await {
                    error!(booking_id = %booking.id, error = %e, "Release during give-up failed; reaper will reclaim");
                }
                self.bookings.mark_failed(booking.id).await?;
                warn!(booking_id = %booking.id, "Gave up on booking stuck at RESERVE_SENT");
                get_metrics().record_recovery_action("gave_up_reserve");
                Ok(RecoveryAction::GaveUp)
            }
            SagaStep::PaymentSent => {
                self.bookings.mark_failed(booking.id).await?;
                error!(
                    booking_id = %booking.id,
                    user_id = %booking.user_id,
                    amount = %booking.total_price,
                    "Gave up on booking stuck at PAYMENT_SENT; charge outcome unknown, holds NOT released. Reconcile manually against the payment service"
                );
                get_metrics().record_recovery_action("gave_up_payment_unreconciled");
                Ok(RecoveryAction::GaveUp)
            }
            _ => Ok(RecoveryAction::Left),
        }
    }
}
