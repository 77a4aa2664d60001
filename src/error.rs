use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error kinds observed across component boundaries. Each component converts
/// its low-level failures into one of these before returning.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("redis error: {0}")]
    Redis(redis::RedisError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Definite negative: the guarded decrement found fewer rooms than
    /// requested for this date.
    #[error("insufficient availability for room {room_id} on {date}")]
    InsufficientAvailability { room_id: Uuid, date: NaiveDate },

    /// Definite negative from the payment gateway.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// A dependency the operation cannot safely proceed without (the durable
    /// idempotency store) did not answer. Retry later with the same key.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A remote call whose outcome cannot be determined. Never treated as
    /// success or failure; never compensated synchronously.
    #[error("remote outcome unknown: {0}")]
    UnclearOutcome(String),

    /// Could not acquire the reservation lock within the wait budget.
    /// Retryable; no state was touched.
    #[error("lock acquisition timed out for {0}")]
    LockTimeout(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code surfaced in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "REDIS_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "RESOURCE_NOT_FOUND",
            AppError::InsufficientAvailability { .. } => "INSUFFICIENT_AVAILABILITY",
            AppError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::UnclearOutcome(_) => "UNCLEAR_OUTCOME",
            AppError::LockTimeout(_) => "LOCK_TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for definite negatives that may drive compensation.
    pub fn is_clear_failure(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::InsufficientAvailability { .. }
                | AppError::PaymentDeclined(_)
        )
    }

    /// True when the remote may have succeeded and compensation is forbidden.
    pub fn is_unclear(&self) -> bool {
        matches!(self, AppError::UnclearOutcome(_))
    }
}
