use crate::api::responses::ApiResponse;
use crate::clients::{InventoryApi, PaymentApi, RemoteError, RemoteResult};
use crate::config::RemoteCallSettings;
use crate::services::{
    ChargeRequest, ChargeResponse, ReleaseRequest, ReserveRequest, ReserveResponse,
};
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// HTTP transport for the split-service deployment. Every call carries a
/// short deadline; unclear failures are retried with exponential backoff and
/// jitter, always with the same body and the same idempotency key.
#[derive(Clone)]
struct RemoteCaller {
    http: reqwest::Client,
    base_url: String,
    max_attempts: u32,
    base_delay: Duration,
}

impl RemoteCaller {
    fn new(base_url: String, settings: &RemoteCallSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.call_timeout())
            .build()
            .expect("reqwest client construction is infallible with these options");
        Self {
            http,
            base_url,
            max_attempts: settings.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> RemoteResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_unclear = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let exp = self.base_delay.saturating_mul(1 << (attempt - 1).min(8));
                let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64 / 2);
                tokio::time::sleep(exp + Duration::from_millis(jitter_ms)).await;
                warn!(url = %url, attempt, "Retrying remote call after unclear failure");
            }

            match self.post_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(RemoteError::Clear { code, message }) => {
                    return Err(RemoteError::Clear { code, message });
                }
                Err(RemoteError::Unclear(reason)) => {
                    last_unclear = reason;
                }
            }
        }

        Err(RemoteError::Unclear(last_unclear))
    }

    async fn post_once<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> RemoteResult<T> {
        let response = match self.http.post(url).json(body).send().await {
            Ok(response) => response,
            // Timeouts, connection resets, refused connections: the server
            // may have processed the request before the transport died.
            Err(e) => return Err(RemoteError::Unclear(e.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            let envelope: ApiResponse<T> = response
                .json()
                .await
                .map_err(|e| RemoteError::Unclear(format!("undecodable response: {}", e)))?;
            return match envelope.data {
                Some(data) => Ok(data),
                None => Err(RemoteError::Unclear(
                    "success response carried no data".to_string(),
                )),
            };
        }

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(RemoteError::Unclear(format!("http {}", status.as_u16())));
        }

        if status.is_client_error() {
            let (code, message) = match response.json::<ApiResponse<serde_json::Value>>().await {
                Ok(envelope) => match envelope.error {
                    Some(err) => (err.code, err.message),
                    None => (format!("HTTP_{}", status.as_u16()), "request rejected".to_string()),
                },
                Err(_) => (format!("HTTP_{}", status.as_u16()), "request rejected".to_string()),
            };
            return Err(RemoteError::Clear { code, message });
        }

        // Remaining 5xx: the handler may have committed before failing to
        // respond. Unclear.
        Err(RemoteError::Unclear(format!("http {}", status.as_u16())))
    }
}

pub struct HttpInventoryClient {
    caller: RemoteCaller,
}

impl HttpInventoryClient {
    pub fn new(settings: &RemoteCallSettings) -> Self {
        Self {
            caller: RemoteCaller::new(settings.inventory_base_url.clone(), settings),
        }
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryClient {
    async fn reserve(&self, request: &ReserveRequest) -> RemoteResult<ReserveResponse> {
        self.caller.post("/inventory/reserve", request).await
    }

    async fn confirm(&self, booking_id: Uuid) -> RemoteResult<()> {
        let _: serde_json::Value = self
            .caller
            .post("/inventory/confirm", &serde_json::json!({ "booking_id": booking_id }))
            .await?;
        Ok(())
    }

    async fn release(&self, request: &ReleaseRequest) -> RemoteResult<()> {
        let _: serde_json::Value = self.caller.post("/inventory/release", request).await?;
        Ok(())
    }
}

pub struct HttpPaymentClient {
    caller: RemoteCaller,
}

impl HttpPaymentClient {
    pub fn new(settings: &RemoteCallSettings) -> Self {
        Self {
            caller: RemoteCaller::new(settings.payment_base_url.clone(), settings),
        }
    }
}

#[async_trait]
impl PaymentApi for HttpPaymentClient {
    async fn charge(&self, request: &ChargeRequest) -> RemoteResult<ChargeResponse> {
        self.caller.post("/payments/process", request).await
    }
}
