use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Externally visible status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Cancelled | BookingStatus::Failed
        )
    }
}

/// Position of a booking in the reserve / pay / confirm pipeline. Written
/// before and after every remote effect so crashes leave a readable trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    ReserveSent,
    ReserveOk,
    PaymentSent,
    Confirmed,
    Failed,
}

impl SagaStep {
    /// Steps the recovery worker treats as possibly stuck.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SagaStep::ReserveSent | SagaStep::PaymentSent)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStep::Confirmed | SagaStep::Failed)
    }
}

/// Saga step transitions. Steps only ever move forward.
#[derive(Debug, Clone)]
pub struct SagaStateMachine;

impl SagaStateMachine {
    pub fn valid_transitions(current: SagaStep) -> Vec<SagaStep> {
        match current {
            SagaStep::ReserveSent => vec![SagaStep::ReserveOk, SagaStep::Failed],
            SagaStep::ReserveOk => vec![SagaStep::PaymentSent, SagaStep::Failed],
            SagaStep::PaymentSent => vec![SagaStep::Confirmed, SagaStep::Failed],
            SagaStep::Confirmed => vec![],
            SagaStep::Failed => vec![],
        }
    }

    pub fn can_transition(from: SagaStep, to: SagaStep) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    pub fn transition(from: SagaStep, to: SagaStep) -> Result<SagaStep> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(AppError::Validation(format!(
                "Invalid saga step transition from {:?} to {:?}",
                from, to
            )))
        }
    }
}

/// A booking row. Owned by the Booking service; Inventory and Payment never
/// touch this table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub saga_step: SagaStep,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a booking in PENDING / RESERVE_SENT, before any remote call.
    pub fn new(
        user_id: Uuid,
        room_id: Uuid,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
        quantity: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            room_id,
            check_in_date,
            check_out_date,
            quantity,
            total_price: Decimal::ZERO,
            status: BookingStatus::Pending,
            saga_step: SagaStep::ReserveSent,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The idempotency key used for both reserve and charge.
    pub fn idempotency_key(&self) -> String {
        saga_key(self.id)
    }
}

/// Builds the structured idempotency key carried through the whole saga.
pub fn saga_key(booking_id: Uuid) -> String {
    format!("booking-{}", booking_id)
}

/// Parses a `booking-{id}` key back into a booking id. Keys of any other
/// shape get no reservation holds.
pub fn parse_saga_key(key: &str) -> Option<Uuid> {
    key.strip_prefix("booking-")
        .and_then(|raw| Uuid::parse_str(raw).ok())
}
