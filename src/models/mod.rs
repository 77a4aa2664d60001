pub mod booking;
pub mod hold;
pub mod payment;
pub mod room;

pub use booking::{parse_saga_key, saga_key, Booking, BookingStatus, SagaStateMachine, SagaStep};
pub use hold::ReservationHold;
pub use payment::{Payment, PaymentStatus};
pub use room::{nightly_dates, RoomAvailability};
