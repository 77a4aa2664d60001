use crate::clients::{InventoryApi, PaymentApi, RemoteResult};
use crate::services::{
    ChargeRequest, ChargeResponse, InventoryService, PaymentService, ReleaseRequest,
    ReserveRequest, ReserveResponse,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// In-process client for single-binary deployments. Service errors map onto
/// the wire taxonomy exactly as the HTTP client would classify them.
pub struct LocalInventoryClient {
    service: Arc<InventoryService>,
}

impl LocalInventoryClient {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl InventoryApi for LocalInventoryClient {
    async fn reserve(&self, request: &ReserveRequest) -> RemoteResult<ReserveResponse> {
        self.service
            .reserve(request.clone())
            .await
            .map_err(Into::into)
    }

    async fn confirm(&self, booking_id: Uuid) -> RemoteResult<()> {
        self.service
            .confirm_reservation(booking_id)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }

    async fn release(&self, request: &ReleaseRequest) -> RemoteResult<()> {
        self.service
            .release(request.clone())
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

pub struct LocalPaymentClient {
    service: Arc<PaymentService>,
}

impl LocalPaymentClient {
    pub fn new(service: Arc<PaymentService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PaymentApi for LocalPaymentClient {
    async fn charge(&self, request: &ChargeRequest) -> RemoteResult<ChargeResponse> {
        self.service
            .charge(request.clone())
            .await
            .map_err(Into::into)
    }
}
