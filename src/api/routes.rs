use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::observability::HealthChecker;
use crate::services::{BookingService, InventoryService, PaymentService};

/// Application state shared across handlers. The services are wired once at
/// startup; nothing else carries process-global state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis_client: redis::Client,
    pub inventory: Arc<InventoryService>,
    pub payment: Arc<PaymentService>,
    pub booking: Arc<BookingService>,
    pub metrics_handle: Option<PrometheusHandle>,
    pub health_checker: Option<Arc<HealthChecker>>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        redis_client: redis::Client,
        inventory: Arc<InventoryService>,
        payment: Arc<PaymentService>,
        booking: Arc<BookingService>,
    ) -> Self {
        Self {
            pool,
            redis_client,
            inventory,
            payment,
            booking,
            metrics_handle: None,
            health_checker: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Adds health checker to the state.
    pub fn with_health_checker(mut self, checker: Arc<HealthChecker>) -> Self {
        self.health_checker = Some(checker);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::detailed_health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Booking endpoints
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/:id", get(handlers::get_booking))
        .route("/users/:user_id/bookings", get(handlers::list_bookings_for_user))
        // Inventory endpoints
        .route("/inventory/reserve", post(handlers::reserve_inventory))
        .route("/inventory/confirm", post(handlers::confirm_reservation))
        .route("/inventory/release", post(handlers::release_inventory))
        .route("/inventory/seed", post(handlers::seed_availability))
        .route("/inventory/:room_id/availability", get(handlers::get_availability))
        // Payment endpoints
        .route("/payments/process", post(handlers::process_payment))
        .route("/payments/:id", get(handlers::get_payment))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
