#![recursion_limit = "256"]

mod common;

use async_trait::async_trait;
use booking_engine::clients::{
    InventoryApi, LocalInventoryClient, LocalPaymentClient, PaymentApi, RemoteError, RemoteResult,
};
use booking_engine::events::{EventProducer, ProducerConfig};
use booking_engine::models::{saga_key, Booking, BookingStatus, PaymentStatus, SagaStep};
use booking_engine::repositories::BookingRepository;
use booking_engine::services::{
    BookingService, ChargeRequest, ChargeResponse, CreateBookingCommand, PaymentService,
    RecoveryService, ReleaseRequest, ReserveRequest, ReserveResponse, SagaOutcome,
    SimulatedGateway, RESERVED,
};
use chrono::{Duration, NaiveDate, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
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

/// The sweep scans the whole bookings table, so these tests cannot share the
/// database concurrently; each takes this lock for its duration.
static DB_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn events() -> Arc<EventProducer> {
    Arc::new(EventProducer::new(None, ProducerConfig::default()))
}

/// Creates a booking row at the given step with total_price set, aged by
/// `age`, the way a crashed or timed-out saga would have left it.
async fn stage_stuck_booking(
    pool: &PgPool,
    step: SagaStep,
    total_price: Decimal,
    age: Duration,
) -> Booking {
    let repo = BookingRepository::new(pool.clone());
    let booking = Booking::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        date(2026, 2, 1),
        date(2026, 2, 3),
        2,
    );
    repo.create(&booking).await.expect("Create failed");

    if step != SagaStep::ReserveSent {
        repo.mark_reserve_ok(booking.id, total_price)
            .await
            .expect("mark_reserve_ok failed");
    }
    if step == SagaStep::PaymentSent {
        repo.mark_payment_sent(booking.id).await.expect("mark_payment_sent failed");
    }

    repo.set_updated_at(booking.id, Utc::now() - age)
        .await
        .expect("Backdating failed");
    repo.find_by_id(booking.id).await.expect("Reload failed")
}

fn recovery_service(
    pool: &PgPool,
    inventory: MockInventoryClient,
    payment: MockPaymentClient,
) -> RecoveryService {
    RecoveryService::new(
        pool.clone(),
        Arc::new(inventory),
        Arc::new(payment),
        events(),
        &common::test_booking_settings(),
    )
}

#[tokio::test]
async fn fresh_bookings_are_not_scanned() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    stage_stuck_booking(&pool, SagaStep::PaymentSent, dec!(100), Duration::minutes(1)).await;

    let service = recovery_service(&pool, MockInventoryClient::new(), MockPaymentClient::new());
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.scanned, 0);
}

#[tokio::test]
async fn stuck_payment_sent_is_confirmed_on_charge_success() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::PaymentSent, dec!(400), Duration::minutes(11)).await;
    let booking_id = booking.id;

    let mut inventory = MockInventoryClient::new();
    inventory.expect_confirm().times(1).returning(|_| Ok(()));

    let payment_id = Uuid::new_v4();
    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .withf(move |req: &ChargeRequest| {
            req.idempotency_key.as_deref() == Some(saga_key(booking_id).as_str())
                && req.amount == dec!(400)
        })
        .times(1)
        .returning(move |_| {
            Ok(ChargeResponse {
                payment_id,
                status: PaymentStatus::Success,
                message: "approved".to_string(),
                transaction_id: format!("txn-{}", Uuid::new_v4()),
            })
        });

    let service = recovery_service(&pool, inventory, payment);
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.confirmed, 1);

    let repo = BookingRepository::new(pool.clone());
    let recovered = repo.find_by_id(booking_id).await.expect("Reload failed");
    assert_eq!(recovered.status, BookingStatus::Confirmed);
    assert_eq!(recovered.saga_step, SagaStep::Confirmed);
    assert_eq!(recovered.payment_id, Some(payment_id));
}

#[tokio::test]
async fn stuck_reserve_sent_replays_reserve_then_pays() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::ReserveSent, dec!(0), Duration::minutes(11)).await;
    let booking_id = booking.id;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_reserve()
        .withf(move |req: &ReserveRequest| {
            req.idempotency_key.as_deref() == Some(saga_key(booking_id).as_str())
        })
        .times(1)
        .returning(|_| {
            Ok(ReserveResponse {
                reservation_id: Uuid::new_v4(),
                total_price: dec!(300),
                status: RESERVED.to_string(),
            })
        });
    inventory.expect_confirm().times(1).returning(|_| Ok(()));

    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .withf(|req: &ChargeRequest| req.amount == dec!(300))
        .times(1)
        .returning(|_| {
            Ok(ChargeResponse {
                payment_id: Uuid::new_v4(),
                status: PaymentStatus::Success,
                message: "approved".to_string(),
                transaction_id: format!("txn-{}", Uuid::new_v4()),
            })
        });

    let service = recovery_service(&pool, inventory, payment);
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.confirmed, 1);

    let repo = BookingRepository::new(pool.clone());
    let recovered = repo.find_by_id(booking_id).await.expect("Reload failed");
    assert_eq!(recovered.status, BookingStatus::Confirmed);
    assert_eq!(recovered.total_price, dec!(300));
}

#[tokio::test]
async fn unclear_charge_leaves_the_booking_untouched() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::PaymentSent, dec!(250), Duration::minutes(11)).await;
    let before = booking.updated_at;

    let inventory = MockInventoryClient::new();
    let mut payment = MockPaymentClient::new();
    payment
        .expect_charge()
        .times(1)
        .returning(|_| Err(RemoteError::Unclear("still timing out".to_string())));

    let service = recovery_service(&pool, inventory, payment);
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.left, 1);

    // Untouched means untouched: the age carries over to the next tick.
    let repo = BookingRepository::new(pool.clone());
    let after = repo.find_by_id(booking.id).await.expect("Reload failed");
    assert_eq!(after.saga_step, SagaStep::PaymentSent);
    assert_eq!(after.updated_at, before);
}

#[tokio::test]
async fn clear_decline_during_recovery_releases_and_fails() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::PaymentSent, dec!(180), Duration::minutes(11)).await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_release()
        .withf(|req: &ReleaseRequest| req.booking_id.is_some())
        .times(1)
        .returning(|_| Ok(()));

    let mut payment = MockPaymentClient::new();
    payment.expect_charge().times(1).returning(|_| {
        Err(RemoteError::Clear {
            code: "PAYMENT_DECLINED".to_string(),
            message: "card expired".to_string(),
        })
    });

    let service = recovery_service(&pool, inventory, payment);
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.failed, 1);

    let repo = BookingRepository::new(pool.clone());
    let failed = repo.find_by_id(booking.id).await.expect("Reload failed");
    assert_eq!(failed.status, BookingStatus::Failed);
}

#[tokio::test]
async fn give_up_at_reserve_sent_releases_the_stock() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::ReserveSent, dec!(0), Duration::hours(25)).await;

    let mut inventory = MockInventoryClient::new();
    inventory
        .expect_release()
        .withf(|req: &ReleaseRequest| req.booking_id.is_some())
        .times(1)
        .returning(|_| Ok(()));

    // No charge expectation: give-up never talks to Payment.
    let service = recovery_service(&pool, inventory, MockPaymentClient::new());
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.gave_up, 1);

    let repo = BookingRepository::new(pool.clone());
    let failed = repo.find_by_id(booking.id).await.expect("Reload failed");
    assert_eq!(failed.status, BookingStatus::Failed);
}

#[tokio::test]
async fn give_up_at_payment_sent_never_releases() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let booking = stage_stuck_booking(&pool, SagaStep::PaymentSent, dec!(500), Duration::hours(25)).await;

    // The charge may have succeeded; releasing would sell the room twice.
    // Neither release nor charge has an expectation, so any call panics.
    let service = recovery_service(&pool, MockInventoryClient::new(), MockPaymentClient::new());
    let stats = service.run_once().await.expect("Sweep failed");
    assert_eq!(stats.gave_up, 1);

    let repo = BookingRepository::new(pool.clone());
    let failed = repo.find_by_id(booking.id).await.expect("Reload failed");
    assert_eq!(failed.status, BookingStatus::Failed);
    assert_eq!(failed.saga_step, SagaStep::Failed);
}

/// Payment client that times out once, then delegates to the real service.
struct FlakyPaymentClient {
    inner: LocalPaymentClient,
    failed_once: AtomicBool,
}

#[async_trait]
impl PaymentApi for FlakyPaymentClient {
    async fn charge(&self, request: &ChargeRequest) -> RemoteResult<ChargeResponse> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(RemoteError::Unclear("deadline exceeded".to_string()));
        }
        self.inner.charge(request).await
    }
}

#[tokio::test]
async fn end_to_end_unclear_payment_recovers_to_confirmed() {
    let _guard = DB_LOCK.lock().await;
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let inventory = common::inventory_service(&pool);
    let payment = Arc::new(PaymentService::new(
        pool.clone(),
        common::payment_idempotency(&pool),
        Arc::new(SimulatedGateway::always_approve()),
    ));

    let room_id = Uuid::new_v4();
    inventory
        .seed(room_id, date(2026, 2, 1), date(2026, 2, 3), 5, dec!(100))
        .await
        .expect("Seed failed");

    let inventory_client = Arc::new(LocalInventoryClient::new(inventory.clone()));
    let flaky_payment = Arc::new(FlakyPaymentClient {
        inner: LocalPaymentClient::new(payment.clone()),
        failed_once: AtomicBool::new(false),
    });

    let booking_service = BookingService::new(
        pool.clone(),
        inventory_client.clone(),
        flaky_payment,
        events(),
    );

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

    let pending = match outcome {
        SagaOutcome::PendingUnclear(booking) => booking,
        other => panic!("Expected PendingUnclear, got {:?}", other),
    };
    assert_eq!(pending.saga_step, SagaStep::PaymentSent);

    let count_after_reserve: (i32,) = sqlx::query_as(
        "SELECT available_count FROM room_availability WHERE room_id = $1 AND availability_date = $2",
    )
    .bind(room_id)
    .bind(date(2026, 2, 1))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count_after_reserve.0, 3);

    // Age it past the stuck threshold, then run one recovery sweep with a
    // healthy payment path.
    let repo = BookingRepository::new(pool.clone());
    repo.set_updated_at(pending.id, Utc::now() - Duration::minutes(11))
        .await
        .expect("Backdating failed");

    let recovery = RecoveryService::new(
        pool.clone(),
        inventory_client,
        Arc::new(LocalPaymentClient::new(payment)),
        events(),
        &common::test_booking_settings(),
    );
    let stats = recovery.run_once().await.expect("Sweep failed");
    assert_eq!(stats.confirmed, 1);

    let recovered = repo.find_by_id(pending.id).await.expect("Reload failed");
    assert_eq!(recovered.status, BookingStatus::Confirmed);
    assert!(recovered.payment_id.is_some());

    // Decremented exactly once across the original attempt and the retry.
    let count_after_recovery: (i32,) = sqlx::query_as(
        "SELECT available_count FROM room_availability WHERE room_id = $1 AND availability_date = $2",
    )
    .bind(room_id)
    .bind(date(2026, 2, 1))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count_after_recovery.0, 3);

    // Holds are gone: the reservation is confirmed, not parked.
    let (holds,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reservation_holds WHERE booking_id = $1")
            .bind(pending.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(holds, 0);
}
