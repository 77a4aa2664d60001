pub mod http;
pub mod local;

pub use http::{HttpInventoryClient, HttpPaymentClient};
pub use local::{LocalInventoryClient, LocalPaymentClient};

use crate::error::AppError;
use crate::services::{ChargeRequest, ChargeResponse, ReleaseRequest, ReserveRequest, ReserveResponse};
use async_trait::async_trait;
use uuid::Uuid;

/// How a remote call failed, as seen by the orchestrator. The distinction
/// drives compensation: only a definite negative may be compensated.
#[derive(Debug, Clone)]
pub enum RemoteError {
    /// The remote returned a definite negative. Safe to compensate.
    Clear { code: String, message: String },
    /// Timeout, 503/504, connection reset, deadline exceeded. The remote may
    /// have succeeded; never compensate on this.
    Unclear(String),
}

impl RemoteError {
    pub fn is_clear(&self) -> bool {
        matches!(self, RemoteError::Clear { .. })
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Clear { code, message } => write!(f, "{}: {}", code, message),
            RemoteError::Unclear(reason) => write!(f, "outcome unknown: {}", reason),
        }
    }
}

/// Maps a service-level error onto the wire taxonomy. Database and
/// dependency failures are unclear by definition: the effect may have
/// committed before the error surfaced.
impl From<AppError> for RemoteError {
    fn from(err: AppError) -> Self {
        if err.is_clear_failure() {
            RemoteError::Clear {
                code: err.code().to_string(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Unclear(err.to_string())
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Inventory as the orchestrator sees it.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn reserve(&self, request: &ReserveRequest) -> RemoteResult<ReserveResponse>;
    async fn confirm(&self, booking_id: Uuid) -> RemoteResult<()>;
    async fn release(&self, request: &ReleaseRequest) -> RemoteResult<()>;
}

/// Payment as the orchestrator sees it.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> RemoteResult<ChargeResponse>;
}
