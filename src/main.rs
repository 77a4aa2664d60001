use booking_engine::api::{create_router, AppState};
use booking_engine::clients::{LocalInventoryClient, LocalPaymentClient};
use booking_engine::config::Settings;
use booking_engine::events::{EventProducer, ProducerConfig};
use booking_engine::idempotency::{
    IdempotencyStore, PostgresIdempotencyStore, RedisIdempotencyCache,
};
use booking_engine::locking::RedisLockProvider;
use booking_engine::observability::{
    init_logging, init_metrics, HealthChecker, LogConfig, LogFormat,
};
use booking_engine::services::{
    BookingService, InventoryService, PaymentService, RecoveryService, SimulatedGateway,
};
use booking_engine::workers::{run_hold_reaper, run_recovery_worker};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration first (needed for log level)
    let settings = Settings::new()?;

    // Initialize structured logging
    let log_config = LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(
            std::env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .as_str(),
        ),
        include_target: true,
    };
    init_logging(&log_config);

    // Initialize Prometheus metrics
    let metrics_handle = init_metrics();
    info!("Configuration loaded, metrics initialized");

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;

    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    // Connect to Redis
    info!("Connecting to Redis at {}...", settings.redis.url);
    let redis_client = redis::Client::open(settings.redis.url.clone())?;
    let mut con = redis_client.get_multiplexed_async_connection().await?;
    let _: () = redis::cmd("PING").query_async(&mut con).await?;
    info!("Redis connection established");

    // Connect to Kafka (with timeout, preserve client)
    info!("Checking Kafka connection...");
    use rskafka::client::ClientBuilder;

    let connection = vec![settings.kafka.brokers.clone()];
    let kafka_client = match tokio::time::timeout(
        Duration::from_secs(3),
        ClientBuilder::new(connection).build(),
    )
    .await
    {
        Ok(Ok(client)) => {
            info!("Kafka client created successfully");
            Some(Arc::new(client))
        }
        Ok(Err(e)) => {
            tracing::warn!("Kafka connection failed: {}. Continuing without Kafka.", e);
            None
        }
        Err(_) => {
            tracing::warn!("Kafka connection timed out. Continuing without Kafka.");
            None
        }
    };

    // Wire the services. Inventory and Payment each own a durable
    // idempotency store; the fast cache is shared Redis, optional.
    let cache_for = |prefix: &str| {
        if settings.booking.idempotency_fast_cache_enabled {
            Some(RedisIdempotencyCache::new(redis_client.clone(), prefix))
        } else {
            None
        }
    };

    let inventory_idempotency = Arc::new(IdempotencyStore::new(
        PostgresIdempotencyStore::new(pool.clone(), "inventory_idempotency"),
        cache_for("idem:inventory"),
        settings.booking.fast_cache_ttl_seconds(),
    ));
    let payment_idempotency = Arc::new(IdempotencyStore::new(
        PostgresIdempotencyStore::new(pool.clone(), "payment_idempotency"),
        cache_for("idem:payment"),
        settings.booking.fast_cache_ttl_seconds(),
    ));

    let locks = RedisLockProvider::new(redis_client.clone());

    let inventory = Arc::new(InventoryService::new(
        pool.clone(),
        inventory_idempotency,
        locks,
        &settings.booking,
    ));
    let payment = Arc::new(PaymentService::new(
        pool.clone(),
        payment_idempotency,
        Arc::new(SimulatedGateway::new(&settings.payment_gateway)),
    ));

    let events = Arc::new(EventProducer::new(
        kafka_client.clone(),
        ProducerConfig {
            topic_prefix: settings.kafka.topic_prefix.clone(),
            ..ProducerConfig::default()
        },
    ));

    let inventory_client = Arc::new(LocalInventoryClient::new(inventory.clone()));
    let payment_client = Arc::new(LocalPaymentClient::new(payment.clone()));

    let booking = Arc::new(BookingService::new(
        pool.clone(),
        inventory_client.clone(),
        payment_client.clone(),
        events.clone(),
    ));
    let recovery = Arc::new(RecoveryService::new(
        pool.clone(),
        inventory_client,
        payment_client,
        events.clone(),
        &settings.booking,
    ));

    // Background workers: the hold reaper and the recovery worker.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(run_hold_reaper(
        inventory.clone(),
        settings.booking.reaper_interval(),
        shutdown_rx.clone(),
    ));
    let recovery_handle = tokio::spawn(run_recovery_worker(
        recovery,
        settings.booking.recovery_interval(),
        shutdown_rx,
    ));

    info!("System startup verification complete.");

    // Create health checker
    let health_checker = Arc::new(HealthChecker::new(
        pool.clone(),
        redis_client.clone(),
        kafka_client.clone(),
    ));

    // Create application state with metrics handle and health checker
    let state = AppState::new(pool, redis_client, inventory, payment, booking)
        .with_metrics(metrics_handle)
        .with_health_checker(health_checker);

    // Create API router
    let app = create_router(state);

    // Start HTTP server
    let addr = format!("0.0.0.0:{}", settings.application.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the workers before exiting.
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(reaper_handle, recovery_handle);
    info!("Workers stopped, bye");

    Ok(())
}
