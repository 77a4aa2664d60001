use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, Payment, PaymentStatus, RoomAvailability, SagaStep,
};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
}

/// Service health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: bool,
    pub redis: bool,
    pub kafka: bool,
}

/// Booking view DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
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

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            room_id: b.room_id,
            check_in_date: b.check_in_date,
            check_out_date: b.check_out_date,
            quantity: b.quantity,
            total_price: b.total_price,
            status: b.status,
            saga_step: b.saga_step,
            payment_id: b.payment_id,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// 202 payload for a saga whose outcome is not yet known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedBookingResponse {
    pub booking: BookingResponse,
    pub message: String,
}

/// Availability view DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub room_id: Uuid,
    pub availability_date: NaiveDate,
    pub available_count: i32,
    pub price_per_night: Decimal,
}

impl From<RoomAvailability> for AvailabilityResponse {
    fn from(r: RoomAvailability) -> Self {
        Self {
            room_id: r.room_id,
            availability_date: r.availability_date,
            available_count: r.available_count,
            price_per_night: r.price_per_night,
        }
    }
}

/// Payment view DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            booking_id: p.booking_id,
            amount: p.amount,
            status: p.status,
            payment_method: p.payment_method,
            transaction_id: p.transaction_id,
            created_at: p.created_at,
        }
    }
}

/// Result of seeding or releasing a range of dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedDatesResponse {
    pub affected_dates: u64,
}
