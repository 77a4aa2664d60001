use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A short-lived claim on one night of inventory. Exists iff the stock was
/// decremented for this (booking, room, date) and neither confirmed nor
/// released yet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReservationHold {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub room_id: Uuid,
    pub availability_date: NaiveDate,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReservationHold {
    pub fn new(
        booking_id: Uuid,
        room_id: Uuid,
        availability_date: NaiveDate,
        quantity: i32,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            room_id,
            availability_date,
            quantity,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
