use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::BookingStatus;

/// Topics for booking events.
pub mod topics {
    pub const BOOKING_CONFIRMED: &str = "booking.confirmed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    BookingConfirmed,
}

/// Envelope wrapping all events with common metadata. Delivery is
/// at-least-once; consumers deduplicate by booking_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub correlation_id: Option<String>,
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: EventType, payload: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source: "booking-engine".to_string(),
            correlation_id: None,
            payload,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Published once per confirmed booking; again with `recovery_confirmed`
/// when the confirmation came out of the recovery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub timestamp: DateTime<Utc>,
    pub recovery_confirmed: bool,
}

impl BookingConfirmedEvent {
    pub fn topic() -> &'static str {
        topics::BOOKING_CONFIRMED
    }
}
