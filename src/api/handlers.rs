use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::requests::{
    AvailabilityQuery, ConfirmReservationRequest, CreateBookingRequest, ProcessPaymentRequest,
    ReleaseInventoryRequest, ReserveInventoryRequest, SeedAvailabilityRequest, ValidationError,
};
use crate::api::responses::{
    AcceptedBookingResponse, AffectedDatesResponse, ApiResponse, AvailabilityResponse,
    BookingResponse, ErrorResponse, HealthResponse, PaymentResponse, ServiceHealth,
    ValidationErrorDetail,
};
use crate::error::AppError;
use crate::services::{
    ChargeRequest, CreateBookingCommand, ReleaseRequest, ReserveRequest, ReserveResponse,
    SagaOutcome,
};

use super::routes::AppState;

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

/// Maps a service error onto the HTTP surface. Business negatives become
/// 409/422 with their code; retryable infrastructure outcomes become 503.
fn error_response(err: AppError) -> HandlerError {
    let status = match &err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::InsufficientAvailability { .. } => StatusCode::CONFLICT,
        AppError::PaymentDeclined(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::ServiceUnavailable(_) | AppError::LockTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AppError::UnclearOutcome(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Request failed");
        return (
            status,
            Json(ApiResponse::<()>::error(ErrorResponse::new(
                "INTERNAL_ERROR",
                "An internal error occurred",
            ))),
        );
    }

    (
        status,
        Json(ApiResponse::<()>::error(ErrorResponse::new(
            err.code(),
            err.to_string(),
        ))),
    )
}

fn validation_response(errors: Vec<ValidationError>) -> HandlerError {
    let details: Vec<ValidationErrorDetail> = errors
        .iter()
        .map(|e| ValidationErrorDetail {
            field: e.field.clone(),
            message: e.message.clone(),
        })
        .collect();

    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let redis_healthy = state
        .redis_client
        .get_multiplexed_async_connection()
        .await
        .is_ok();

    let kafka_healthy = state
        .health_checker
        .as_ref()
        .map(|c| c.check_kafka().status.is_healthy())
        .unwrap_or(false);

    let response = HealthResponse {
        status: if db_healthy && redis_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        services: ServiceHealth {
            database: db_healthy,
            redis: redis_healthy,
            kafka: kafka_healthy,
        },
    };

    Json(ApiResponse::success(response))
}

/// Detailed per-dependency health report.
pub async fn detailed_health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<crate::observability::AggregatedHealth>>, HandlerError> {
    match &state.health_checker {
        Some(checker) => Ok(Json(ApiResponse::success(checker.check_all().await))),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::error(ErrorResponse::new(
                "SERVICE_UNAVAILABLE",
                "Health checker not configured",
            ))),
        )),
    }
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

// ============================================================================
// Booking Handlers
// ============================================================================

/// Create a booking and drive the saga. Terminal confirm maps to 200,
/// a business negative to its error code, an unclear outcome to 202.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(errors));
    }

    let command = CreateBookingCommand {
        user_id: request.user_id,
        room_id: request.room_id,
        check_in_date: request.check_in_date,
        check_out_date: request.check_out_date,
        quantity: request.quantity,
        payment_method: request.payment_method,
    };

    match state.booking.create_booking(command).await {
        Ok(SagaOutcome::Confirmed(booking)) => Ok((
            StatusCode::OK,
            Json(serde_json::to_value(ApiResponse::success(BookingResponse::from(booking))).unwrap_or_default()),
        )),
        Ok(SagaOutcome::PendingUnclear(booking)) => {
            let accepted = AcceptedBookingResponse {
                booking: BookingResponse::from(booking),
                message: "Booking is being processed".to_string(),
            };
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::to_value(ApiResponse::success(accepted)).unwrap_or_default()),
            ))
        }
        Ok(SagaOutcome::BusinessFailure { code, message, .. }) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::<()>::error(ErrorResponse::new(code, message))),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Get booking by ID.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, HandlerError> {
    match state.booking.get_booking(id).await {
        Ok(booking) => Ok(Json(ApiResponse::success(BookingResponse::from(booking)))),
        Err(e) => Err(error_response(e)),
    }
}

/// List a user's bookings, newest first.
pub async fn list_bookings_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, HandlerError> {
    match state.booking.list_bookings_for_user(user_id).await {
        Ok(bookings) => Ok(Json(ApiResponse::success(
            bookings.into_iter().map(BookingResponse::from).collect(),
        ))),
        Err(e) => Err(error_response(e)),
    }
}

// ============================================================================
// Inventory Handlers
// ============================================================================

/// Reserve rooms for a stay.
pub async fn reserve_inventory(
    State(state): State<AppState>,
    Json(request): Json<ReserveInventoryRequest>,
) -> Result<Json<ApiResponse<ReserveResponse>>, HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(errors));
    }

    let service_request = ReserveRequest {
        room_id: request.room_id,
        check_in_date: request.check_in_date,
        check_out_date: request.check_out_date,
        quantity: request.quantity,
        idempotency_key: request.idempotency_key,
    };

    match state.inventory.reserve(service_request).await {
        Ok(response) => Ok(Json(ApiResponse::success(response))),
        Err(e) => Err(error_response(e)),
    }
}

/// Confirm a reservation: delete the booking's holds. Idempotent.
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Json(request): Json<ConfirmReservationRequest>,
) -> Result<Json<ApiResponse<AffectedDatesResponse>>, HandlerError> {
    match state.inventory.confirm_reservation(request.booking_id).await {
        Ok(deleted) => Ok(Json(ApiResponse::success(AffectedDatesResponse {
            affected_dates: deleted,
        }))),
        Err(e) => Err(error_response(e)),
    }
}

/// Release reserved stock. With a booking_id repeated calls are no-ops.
pub async fn release_inventory(
    State(state): State<AppState>,
    Json(request): Json<ReleaseInventoryRequest>,
) -> Result<Json<ApiResponse<AffectedDatesResponse>>, HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(errors));
    }

    let service_request = ReleaseRequest {
        room_id: request.room_id,
        check_in_date: request.check_in_date,
        check_out_date: request.check_out_date,
        quantity: request.quantity,
        booking_id: request.booking_id,
    };

    match state.inventory.release(service_request).await {
        Ok(credited) => Ok(Json(ApiResponse::success(AffectedDatesResponse {
            affected_dates: credited,
        }))),
        Err(e) => Err(error_response(e)),
    }
}

/// Seed catalog stock and price for a date range.
pub async fn seed_availability(
    State(state): State<AppState>,
    Json(request): Json<SeedAvailabilityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AffectedDatesResponse>>), HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(errors));
    }

    match state
        .inventory
        .seed(
            request.room_id,
            request.from_date,
            request.to_date,
            request.available_count,
            request.price_per_night,
        )
        .await
    {
        Ok(seeded) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(AffectedDatesResponse {
                affected_dates: seeded,
            })),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Read the availability view for a room. Stale reads are fine here.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<AvailabilityResponse>>>, HandlerError> {
    match state
        .inventory
        .availability(room_id, query.from_date, query.to_date)
        .await
    {
        Ok(rows) => Ok(Json(ApiResponse::success(
            rows.into_iter().map(AvailabilityResponse::from).collect(),
        ))),
        Err(e) => Err(error_response(e)),
    }
}

// ============================================================================
// Payment Handlers
// ============================================================================

/// Process a charge. A declined charge is a successful request whose
/// response carries status FAILED.
pub async fn process_payment(
    State(state): State<AppState>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<ApiResponse<crate::services::ChargeResponse>>, HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(errors));
    }

    let service_request = ChargeRequest {
        user_id: request.user_id,
        booking_id: request.booking_id,
        amount: request.amount,
        payment_method: request.payment_method,
        idempotency_key: request.idempotency_key,
    };

    match state.payment.charge(service_request).await {
        Ok(response) => Ok(Json(ApiResponse::success(response))),
        Err(e) => Err(error_response(e)),
    }
}

/// Get payment by ID.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, HandlerError> {
    match state.payment.get_payment(id).await {
        Ok(payment) => Ok(Json(ApiResponse::success(PaymentResponse::from(payment)))),
        Err(e) => Err(error_response(e)),
    }
}
