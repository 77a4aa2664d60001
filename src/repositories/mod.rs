pub mod availability_repository;
pub mod booking_repository;
pub mod hold_repository;
pub mod payment_repository;

pub use availability_repository::AvailabilityRepository;
pub use booking_repository::BookingRepository;
pub use hold_repository::HoldRepository;
pub use payment_repository::PaymentRepository;

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
