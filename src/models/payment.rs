use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a payment. Never rewritten once terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Success | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a PENDING payment with a fresh gateway transaction id.
    pub fn new(user_id: Uuid, booking_id: Uuid, amount: Decimal, payment_method: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            booking_id,
            amount,
            status: PaymentStatus::Pending,
            payment_method,
            transaction_id: format!("txn-{}", Uuid::new_v4()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_payment_is_pending_with_unique_transaction_id() {
        let user = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let a = Payment::new(user, booking, dec!(400), "CREDIT_CARD".to_string());
        let b = Payment::new(user, booking, dec!(400), "CREDIT_CARD".to_string());
        assert_eq!(a.status, PaymentStatus::Pending);
        assert!(!a.status.is_terminal());
        assert_ne!(a.transaction_id, b.transaction_id);
    }
}
