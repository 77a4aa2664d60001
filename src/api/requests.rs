use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

fn validate_stay(
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    quantity: i32,
    errors: &mut Vec<ValidationError>,
) {
    if check_out_date <= check_in_date {
        errors.push(ValidationError::new(
            "check_out_date",
            "check_out_date must be after check_in_date",
        ));
    }
    if quantity <= 0 {
        errors.push(ValidationError::new("quantity", "quantity must be positive"));
    }
}

/// Request to create a booking and run the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub payment_method: Option<String>,
}

impl CreateBookingRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        validate_stay(self.check_in_date, self.check_out_date, self.quantity, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to reserve inventory directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveInventoryRequest {
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

impl ReserveInventoryRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        validate_stay(self.check_in_date, self.check_out_date, self.quantity, &mut errors);
        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() {
                errors.push(ValidationError::new(
                    "idempotency_key",
                    "idempotency_key must not be blank when present",
                ));
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReservationRequest {
    pub booking_id: Uuid,
}

/// Compensation request. Without a booking_id the credit is unconditional
/// and must not be sent twice; automatic callers always set it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInventoryRequest {
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub booking_id: Option<Uuid>,
}

impl ReleaseInventoryRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        validate_stay(self.check_in_date, self.check_out_date, self.quantity, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Catalog seeding for a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAvailabilityRequest {
    pub room_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub available_count: i32,
    pub price_per_night: Decimal,
}

impl SeedAvailabilityRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.to_date <= self.from_date {
            errors.push(ValidationError::new("to_date", "to_date must be after from_date"));
        }
        if self.available_count < 0 {
            errors.push(ValidationError::new(
                "available_count",
                "available_count must not be negative",
            ));
        }
        if self.price_per_night < Decimal::ZERO {
            errors.push(ValidationError::new(
                "price_per_night",
                "price_per_night must not be negative",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Request to process a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub idempotency_key: Option<String>,
}

impl ProcessPaymentRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if self.payment_method.trim().is_empty() {
            errors.push(ValidationError::new(
                "payment_method",
                "payment_method cannot be empty",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
