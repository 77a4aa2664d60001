#![recursion_limit = "256"]

mod common;

use async_trait::async_trait;
use booking_engine::clients::{InventoryApi, PaymentApi, RemoteError, RemoteResult};
use booking_engine::error::AppError;
use booking_engine::events::{EventProducer, ProducerConfig};
use booking_engine::models::{BookingStatus, PaymentStatus, SagaStep};
use booking_engine::services::{
    BookingService, ChargeRequest, ChargeResponse, CreateBookingCommand, ReleaseRequest,
    ReserveRequest, ReserveResponse, SagaOutcome, RESERVED,
};
use chrono::NaiveDate;
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub InventoryClient {}

    #[async_trait]
    impl InventoryApi for InventoryClient {
        async fn reserve(&self, request: &ReserveRequest) -> RemoteResult<ReserveResponse>;
        async fn confirm(&self, booking_id: Uuid) -> RemoteResult<()>;
        async fn release(&self, request: &ReleaseRequest) -> RemoteResult<()>;
    }
}

mock! {
    pub PaymentClient {}

    #[async_trait]
    impl PaymentApi for PaymentClient {
        async fn charge(&self, request: &ChargeRequest) -> RemoteResult<ChargeResponse>;
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn events() -> Arc<EventProducer> {
    Arc::new(EventProducer::new(None, ProducerConfig::default()))
}

fn reserved(total_price: Decimal) -> ReserveResponse {
    ReserveResponse {
        reservation_id: Uuid::new_v4(),
        total_price,
        status: RESERVED.to_string(),
    }
}

fn charge_decision(status: PaymentStatus, message: &str) -> ChargeResponse {
    ChargeResponse {
        payment_id: Uuid::new_v4(),
        status,
        message: message.to_string(),
        transaction_id: format!("txn-{}", Uuid::new_v4()),
    }
}

fn command() -> CreateBookingCommand {
    CreateBookingCommand {
        user_id: Uuid::new_v4(),
        room_id: Uuid::new_v4(),
        check_in_date: date(2026, 2, 1),
        check_out_date: date(2026, 2, 3),
        quantity: 2,
        payment_method: None,
    }
}

fn carries_saga_key(key: &Option<String>) -> bool {
    key.as_deref().map(|k| k.starts_with("booking-")).unwrap_or(false)
}

#[tokio::test]
async fn happy_path_confirms_the_booking() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .withf(|req: &ReserveRequest| carries_saga_key(&req.idempotency_key) && req.quantity == 2)
        .times(1)
        .returning(|_| Ok(reserved(dec!(400))));
    inventory.expect_confirm().times(1).returning(|_| Ok(()));

    let payment_id = Uuid::new_v4();
    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .withf(|req: &ChargeRequest| carries_saga_key(&req.idempotency_key) && req.amount == dec!(400))
        .times(1)
        .returning(move |_| {
            let mut response = charge_decision(PaymentStatus::Success, "approved");
            response.payment_id = payment_id;
            Ok(response)
        });

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let outcome = service.create_booking(command()).await.expect("Saga failed");
    let booking = match outcome {
        SagaOutcome::Confirmed(booking) => booking,
        other => panic!("Expected Confirmed, got {:?}", other),
    };

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.saga_step, SagaStep::Confirmed);
    assert_eq!(booking.total_price, dec!(400));
    assert_eq!(booking.payment_id, Some(payment_id));

    let stored = service.get_booking(booking.id).await.expect("Booking lookup failed");
    assert_eq!(stored.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn clear_reserve_failure_compensates_and_fails() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory.expect_reserve().times(1).returning(|_| {
        Err(RemoteError::Clear {
            code: "INSUFFICIENT_AVAILABILITY".to_string(),
            message: "no rooms left".to_string(),
        })
    });
    // Compensation release is keyed by booking_id; a no-op remotely, but the
    // orchestrator must still issue it.
    inventory
        .expect_release()
        .withf(|req: &ReleaseRequest| req.booking_id.is_some())
        .times(1)
        .returning(|_| Ok(()));

    let payment = MockPaymentClient::new();

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let outcome = service.create_booking(command()).await.expect("Saga errored");
    match outcome {
        SagaOutcome::BusinessFailure { booking, code, .. } => {
            assert_eq!(code, "INSUFFICIENT_AVAILABILITY");
            assert_eq!(booking.status, BookingStatus::Failed);
            assert_eq!(booking.saga_step, SagaStep::Failed);
        }
        other => panic!("Expected BusinessFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn payment_decline_releases_and_fails() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .times(1)
        .returning(|_| Ok(reserved(dec!(200))));
    inventory
        .expect_release()
        .withf(|req: &ReleaseRequest| req.booking_id.is_some())
        .times(1)
        .returning(|_| Ok(()));

    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .times(1)
        .returning(|_| Ok(charge_decision(PaymentStatus::Failed, "card declined")));

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let outcome = service.create_booking(command()).await.expect("Saga errored");
    match outcome {
        SagaOutcome::BusinessFailure { booking, code, message } => {
            assert_eq!(code, "PAYMENT_DECLINED");
            assert_eq!(message, "card declined");
            assert_eq!(booking.status, BookingStatus::Failed);
        }
        other => panic!("Expected BusinessFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn unclear_charge_is_accepted_not_compensated() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .times(1)
        .returning(|_| Ok(reserved(dec!(300))));
    // No release expectation: compensating an unclear charge would be a bug
    // and panics the mock.

    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .times(1)
        .returning(|_| Err(RemoteError::Unclear("deadline exceeded".to_string())));

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let outcome = service.create_booking(command()).await.expect("Saga errored");
    match outcome {
        SagaOutcome::PendingUnclear(booking) => {
            assert_eq!(booking.status, BookingStatus::Pending);
            assert_eq!(booking.saga_step, SagaStep::PaymentSent);
            assert_eq!(booking.total_price, dec!(300));
        }
        other => panic!("Expected PendingUnclear, got {:?}", other),
    }
}

#[tokio::test]
async fn unclear_reserve_is_accepted_at_reserve_sent() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .times(1)
        .returning(|_| Err(RemoteError::Unclear("connection reset".to_string())));

    let payment = MockPaymentClient::new();

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let outcome = service.create_booking(command()).await.expect("Saga errored");
    match outcome {
        SagaOutcome::PendingUnclear(booking) => {
            assert_eq!(booking.status, BookingStatus::Pending);
            assert_eq!(booking.saga_step, SagaStep::ReserveSent);
        }
        other => panic!("Expected PendingUnclear, got {:?}", other),
    }
}

#[tokio::test]
async fn confirm_failure_after_charge_stays_at_payment_sent() {
    let pool = common::setup_test_db().await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .times(1)
        .returning(|_| Ok(reserved(dec!(150))));
    inventory
        .expect_confirm()
        .times(1)
        .returning(|_| Err(RemoteError::Unclear("timeout".to_string())));

    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .times(1)
        .returning(|_| Ok(charge_decision(PaymentStatus::Success, "approved")));

    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    // Money is taken; the booking must not fail, and must not confirm
    // without its holds cleared. Recovery owns it from here.
    let outcome = service.create_booking(command()).await.expect("Saga errored");
    match outcome {
        SagaOutcome::PendingUnclear(booking) => {
            assert_eq!(booking.saga_step, SagaStep::PaymentSent);
        }
        other => panic!("Expected PendingUnclear, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_stay_is_rejected_before_any_row_is_written() {
    let pool = common::setup_test_db().await;

    let inventory = MockInventoryClient::new();
    let payment = MockPaymentClient::new();
    let service = BookingService::new(pool.clone(), Arc::new(inventory), Arc::new(payment), events());

    let user_id = Uuid::new_v4();
    let mut bad = command();
    bad.user_id = user_id;
    bad.check_out_date = bad.check_in_date;

    let err = service.create_booking(bad).await.expect_err("Inverted stay must fail");
    assert!(matches!(err, AppError::Validation(_)));

    let bookings = service
        .list_bookings_for_user(user_id)
        .await
        .expect("List failed");
    assert!(bookings.is_empty());
}
