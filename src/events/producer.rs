use crate::error::{AppError, Result};
use crate::models::Booking;
use crate::events::types::{BookingConfirmedEvent, EventEnvelope, EventType};
use anyhow::anyhow;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::record::Record;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Configuration for the Kafka producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub topic_prefix: String,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "booking".to_string(),
            retry_count: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Kafka event producer. Constructed once at startup around the process-wide
/// client; when Kafka was not reachable at startup, publishing degrades to a
/// debug log instead of failing bookings.
pub struct EventProducer {
    config: ProducerConfig,
    partition_clients: Arc<RwLock<BTreeMap<String, Arc<PartitionClient>>>>,
    client: Option<Arc<rskafka::client::Client>>,
}

impl EventProducer {
    pub fn new(client: Option<Arc<rskafka::client::Client>>, config: ProducerConfig) -> Self {
        Self {
            config,
            partition_clients: Arc::new(RwLock::new(BTreeMap::new())),
            client,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn full_topic(&self, topic: &str) -> String {
        format!("{}.{}", self.config.topic_prefix, topic)
    }

    /// Gets or creates a partition client for the given topic.
    async fn get_partition_client(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        {
            let clients = self.partition_clients.read().await;
            if let Some(client) = clients.get(topic) {
                return Ok(client.clone());
            }
        }

        let kafka_client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow!("Kafka client not connected")))?;

        let partition_client = kafka_client
            .partition_client(topic.to_string(), 0, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| AppError::Internal(anyhow!("Failed to get partition client: {}", e)))?;

        let client = Arc::new(partition_client);

        {
            let mut clients = self.partition_clients.write().await;
            clients.insert(topic.to_string(), client.clone());
        }

        Ok(client)
    }

    /// Sends one message, retrying a bounded number of times.
    pub async fn send<T: Serialize>(&self, topic: &str, key: Option<&str>, payload: &T) -> Result<i64> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow!("Failed to serialize payload: {}", e)))?;

        let full_topic = self.full_topic(topic);
        let partition_client = self.get_partition_client(&full_topic).await?;

        let record = Record {
            key: key.map(|k| k.as_bytes().to_vec()),
            value: Some(json),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let mut last_error = None;
        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                warn!("Retrying Kafka send, attempt {}/{}", attempt, self.config.retry_count);
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms * attempt as u64)).await;
            }

            match partition_client
                .produce(vec![record.clone()], Compression::NoCompression)
                .await
            {
                Ok(offsets) => {
                    let offset = offsets.first().copied().unwrap_or(0);
                    debug!("Message sent to topic {} at offset {}", full_topic, offset);
                    return Ok(offset);
                }
                Err(e) => {
                    error!("Failed to send message to Kafka: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::Internal(anyhow!(
            "Failed to send message after {} retries: {:?}",
            self.config.retry_count,
            last_error
        )))
    }

    /// Publishes the confirmation event for a booking, keyed by booking id so
    /// consumers can deduplicate.
    pub async fn publish_booking_confirmed(
        &self,
        booking: &Booking,
        recovery_confirmed: bool,
    ) -> Result<()> {
        if self.client.is_none() {
            debug!(booking_id = %booking.id, "Kafka not connected, skipping BookingConfirmed publish");
            return Ok(());
        }

        let event = BookingConfirmedEvent {
            booking_id: booking.id,
            user_id: booking.user_id,
            room_id: booking.room_id,
            check_in: booking.check_in_date,
            check_out: booking.check_out_date,
            total_price: booking.total_price,
            status: booking.status,
            timestamp: Utc::now(),
            recovery_confirmed,
        };
        let envelope = EventEnvelope::new(EventType::BookingConfirmed, event)
            .with_correlation_id(booking.idempotency_key());

        let key = booking.id.to_string();
        self.send(BookingConfirmedEvent::topic(), Some(&key), &envelope)
            .await
            .map(|_| ())
    }
}
