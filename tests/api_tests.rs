#![recursion_limit = "256"]

mod common;

use booking_engine::api::requests::{
    CreateBookingRequest, ProcessPaymentRequest, ReserveInventoryRequest, SeedAvailabilityRequest,
};
use booking_engine::api::responses::{ApiResponse, BookingResponse, ErrorResponse};
use booking_engine::clients::{LocalInventoryClient, LocalPaymentClient};
use booking_engine::events::{EventProducer, ProducerConfig};
use booking_engine::models::{Booking, BookingStatus, SagaStep};
use booking_engine::services::{
    BookingService, CreateBookingCommand, PaymentService, SagaOutcome, SimulatedGateway,
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn events() -> Arc<EventProducer> {
    Arc::new(EventProducer::new(None, ProducerConfig::default()))
}

/// The full pipeline over real services and local clients, as main() wires
/// it minus HTTP framing.
fn booking_stack(pool: &sqlx::PgPool, gateway: SimulatedGateway) -> (Arc<booking_engine::services::InventoryService>, BookingService) {
    let inventory = common::inventory_service(pool);
    let payment = Arc::new(PaymentService::new(
        pool.clone(),
        common::payment_idempotency(pool),
        Arc::new(gateway),
    ));
    let booking = BookingService::new(
        pool.clone(),
        Arc::new(LocalInventoryClient::new(inventory.clone())),
        Arc::new(LocalPaymentClient::new(payment)),
        events(),
    );
    (inventory, booking)
}

#[tokio::test]
async fn api_response_success_serialization() {
    let response: ApiResponse<String> = ApiResponse::success("test data".to_string());
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"data\":\"test data\""));
}

#[tokio::test]
async fn api_response_error_serialization() {
    let error = ErrorResponse::new("INSUFFICIENT_AVAILABILITY", "no rooms left");
    let response: ApiResponse<()> = ApiResponse::<()>::error(error);
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("\"code\":\"INSUFFICIENT_AVAILABILITY\""));
}

#[tokio::test]
async fn booking_response_carries_status_and_step() {
    let booking = Booking::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        date(2026, 2, 1),
        date(2026, 2, 3),
        1,
    );
    let response = BookingResponse::from(booking.clone());
    assert_eq!(response.id, booking.id);
    assert_eq!(response.status, BookingStatus::Pending);
    assert_eq!(response.saga_step, SagaStep::ReserveSent);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"status\":\"PENDING\""));
    assert!(json.contains("\"saga_step\":\"RESERVE_SENT\""));
}

#[tokio::test]
async fn create_booking_request_validation() {
    let valid = CreateBookingRequest {
        user_id: Uuid::new_v4(),
        room_id: Uuid::new_v4(),
        check_in_date: date(2026, 2, 1),
        check_out_date: date(2026, 2, 3),
        quantity: 1,
        payment_method: None,
    };
    assert!(valid.validate().is_ok());

    let mut inverted = valid.clone();
    inverted.check_out_date = date(2026, 1, 31);
    let errors = inverted.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.field == "check_out_date"));

    let mut empty = valid;
    empty.quantity = 0;
    let errors = empty.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.field == "quantity"));
}

#[tokio::test]
async fn reserve_request_rejects_blank_idempotency_key() {
    let request = ReserveInventoryRequest {
        room_id: Uuid::new_v4(),
        check_in_date: date(2026, 2, 1),
        check_out_date: date(2026, 2, 2),
        quantity: 1,
        idempotency_key: Some("   ".to_string()),
    };
    let errors = request.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.field == "idempotency_key"));
}

#[tokio::test]
async fn payment_request_validation() {
    let request = ProcessPaymentRequest {
        user_id: Uuid::new_v4(),
        booking_id: Uuid::new_v4(),
        amount: dec!(0),
        payment_method: "".to_string(),
        idempotency_key: None,
    };
    let errors = request.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn seed_request_validation() {
    let request = SeedAvailabilityRequest {
        room_id: Uuid::new_v4(),
        from_date: date(2026, 2, 3),
        to_date: date(2026, 2, 1),
        available_count: -1,
        price_per_night: dec!(-5),
    };
    let errors = request.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
}

#[tokio::test]
async fn full_stack_happy_path_confirms_and_sells_stock() {
    let pool = common::setup_test_db().await;
    let (inventory, booking_service) = booking_stack(&pool, SimulatedGateway::always_approve());

    let room_id = Uuid::new_v4();
    inventory
        .seed(room_id, date(2026, 2, 1), date(2026, 2, 3), 5, dec!(100))
        .await
        .expect("Seed failed");

    let outcome = booking_service
        .create_booking(CreateBookingCommand {
            user_id: Uuid::new_v4(),
            room_id,
            check_in_date: date(2026, 2, 1),
            check_out_date: date(2026, 2, 3),
            quantity: 2,
            payment_method: None,
        })
        .await
        .expect("Saga errored");

    let booking = match outcome {
        SagaOutcome::Confirmed(booking) => booking,
        other => panic!("Expected Confirmed, got {:?}", other),
    };
    assert_eq!(booking.total_price, dec!(400));
    assert!(booking.payment_id.is_some());

    // Stock sold for both nights, holds cleared.
    let rows = inventory
        .availability(room_id, date(2026, 2, 1), date(2026, 2, 3))
        .await
        .expect("Availability read failed");
    assert!(rows.iter().all(|r| r.available_count == 3));

    let (holds,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reservation_holds WHERE booking_id = $1")
            .bind(booking.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(holds, 0);
}

#[tokio::test]
async fn full_stack_decline_restores_stock() {
    let pool = common::setup_test_db().await;
    let (inventory, booking_service) = booking_stack(&pool, SimulatedGateway::always_decline());

    let room_id = Uuid::new_v4();
    inventory
        .seed(room_id, date(2026, 3, 1), date(2026, 3, 3), 5, dec!(100))
        .await
        .expect("Seed failed");

    let outcome = booking_service
        .create_booking(CreateBookingCommand {
            user_id: Uuid::new_v4(),
            room_id,
            check_in_date: date(2026, 3, 1),
            check_out_date: date(2026, 3, 3),
            quantity: 1,
            payment_method: None,
        })
        .await
        .expect("Saga errored");

    let booking = match outcome {
        SagaOutcome::BusinessFailure { booking, code, .. } => {
            assert_eq!(code, "PAYMENT_DECLINED");
            booking
        }
        other => panic!("Expected BusinessFailure, got {:?}", other),
    };
    assert_eq!(booking.status, BookingStatus::Failed);

    // Compensation returned every night; no hold is left behind.
    let rows = inventory
        .availability(room_id, date(2026, 3, 1), date(2026, 3, 3))
        .await
        .expect("Availability read failed");
    assert!(rows.iter().all(|r| r.available_count == 5));

    let (holds,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reservation_holds WHERE booking_id = $1")
            .bind(booking.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(holds, 0);
}

#[tokio::test]
async fn full_stack_oversell_is_rejected_as_business_failure() {
    let pool = common::setup_test_db().await;
    let (inventory, booking_service) = booking_stack(&pool, SimulatedGateway::always_approve());

    let room_id = Uuid::new_v4();
    inventory
        .seed(room_id, date(2026, 4, 1), date(2026, 4, 2), 1, dec!(100))
        .await
        .expect("Seed failed");

    let command = CreateBookingCommand {
        user_id: Uuid::new_v4(),
        room_id,
        check_in_date: date(2026, 4, 1),
        check_out_date: date(2026, 4, 2),
        quantity: 1,
        payment_method: None,
    };

    let first = booking_service
        .create_booking(command.clone())
        .await
        .expect("Saga errored");
    assert!(matches!(first, SagaOutcome::Confirmed(_)));

    let second = booking_service
        .create_booking(command)
        .await
        .expect("Saga errored");
    match second {
        SagaOutcome::BusinessFailure { code, .. } => {
            assert_eq!(code, "INSUFFICIENT_AVAILABILITY");
        }
        other => panic!("Expected BusinessFailure, got {:?}", other),
    }
}
