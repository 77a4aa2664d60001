use crate::config::GatewaySettings;
use crate::error::{AppError, Result};
use crate::idempotency::IdempotencyStore;
use crate::models::{Payment, PaymentStatus};
use crate::observability::get_metrics;
use crate::repositories::PaymentRepository;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub message: String,
    pub transaction_id: String,
}

/// Outcome of one authorization attempt at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayDecision {
    pub approved: bool,
    pub message: String,
}

/// The gateway seam. The simulation behind it is replaceable; what matters
/// is that the terminal decision commits atomically with the idempotency
/// memo.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, payment: &Payment) -> GatewayDecision;
}

/// Randomized stand-in for a card processor: a brief pause, then approve or
/// decline at the configured rate.
pub struct SimulatedGateway {
    success_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl SimulatedGateway {
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            success_rate: settings.success_rate.clamp(0.0, 1.0),
            min_latency: Duration::from_millis(settings.min_latency_ms),
            max_latency: Duration::from_millis(settings.max_latency_ms.max(settings.min_latency_ms)),
        }
    }

    /// Gateway that always approves. Test wiring.
    pub fn always_approve() -> Self {
        Self {
            success_rate: 1.0,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
        }
    }

    /// Gateway that always declines. Test wiring.
    pub fn always_decline() -> Self {
        Self {
            success_rate: 0.0,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, payment: &Payment) -> GatewayDecision {
        let (pause, approved) = {
            let mut rng = rand::thread_rng();
            let pause = if self.max_latency > self.min_latency {
                rng.gen_range(self.min_latency..=self.max_latency)
            } else {
                self.min_latency
            };
            (pause, rng.gen_bool(self.success_rate))
        };

        tokio::time::sleep(pause).await;

        if approved {
            GatewayDecision {
                approved: true,
                message: format!("Approved {} via {}", payment.amount, payment.payment_method),
            }
        } else {
            GatewayDecision {
                approved: false,
                message: "Card declined by issuer".to_string(),
            }
        }
    }
}

/// Payment core: idempotent charge. Owns payments and the payment
/// idempotency store.
pub struct PaymentService {
    pool: PgPool,
    payments: PaymentRepository,
    idempotency: Arc<IdempotencyStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        idempotency: Arc<IdempotencyStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            payments: PaymentRepository::new(pool.clone()),
            pool,
            idempotency,
            gateway,
        }
    }

    /// Charges once per idempotency key. The PENDING row, the terminal
    /// decision, and the memo commit together; identical keys can never
    /// reach conflicting terminal decisions.
    pub async fn charge(&self, request: ChargeRequest) -> Result<ChargeResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation("amount must be positive".to_string()));
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(cached) = self.idempotency.lookup::<ChargeResponse>(key).await? {
                debug!(key, "Charge request replayed from idempotency store");
                get_metrics().record_idempotent_replay("payment");
                return Ok(cached);
            }
        }

        let payment = Payment::new(
            request.user_id,
            request.booking_id,
            request.amount,
            request.payment_method.clone(),
        );

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        PaymentRepository::insert(&mut tx, &payment).await?;

        let decision = self.gateway.authorize(&payment).await;
        let status = if decision.approved {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        PaymentRepository::finalize(&mut tx, payment.id, status).await?;

        let response = ChargeResponse {
            payment_id: payment.id,
            status,
            message: decision.message,
            transaction_id: payment.transaction_id.clone(),
        };

        if let Some(key) = &request.idempotency_key {
            let won = self.idempotency.record(&mut tx, key, &response).await?;
            if !won {
                // A concurrent charge with this key committed first; its
                // decision is the only one that exists.
                tx.rollback().await.map_err(AppError::Database)?;
                return self.idempotency.reread(key).await;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;

        if let Some(key) = &request.idempotency_key {
            self.idempotency.warm(key, &response).await;
        }

        info!(
            payment_id = %response.payment_id,
            booking_id = %request.booking_id,
            status = ?response.status,
            "Charge processed"
        );
        get_metrics().record_payment(response.status == PaymentStatus::Success);

        Ok(response)
    }

    pub async fn get_payment(&self, id: Uuid) -> Result<Payment> {
        self.payments.find_by_id(id).await
    }

    pub async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>> {
        self.payments.find_by_booking(booking_id).await
    }
}
