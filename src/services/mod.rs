pub mod booking_service;
pub mod inventory_service;
pub mod payment_service;
pub mod recovery_service;

pub use booking_service::{BookingService, CreateBookingCommand, SagaOutcome};
pub use inventory_service::{
    InventoryService, ReleaseRequest, ReserveRequest, ReserveResponse, RESERVED,
};
pub use payment_service::{
    ChargeRequest, ChargeResponse, GatewayDecision, PaymentGateway, PaymentService,
    SimulatedGateway,
};
pub use recovery_service::{RecoveryAction, RecoveryService, RecoveryStats};
