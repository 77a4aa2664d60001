use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Health status of a service or dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }
}

/// Health status of a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub message: Option<String>,
}

impl DependencyHealth {
    pub fn healthy(name: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    pub fn degraded(name: impl Into<String>, latency_ms: f64, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            latency_ms: Some(latency_ms),
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: Vec<DependencyHealth>,
}

impl AggregatedHealth {
    pub fn new(version: String, uptime_seconds: u64, dependencies: Vec<DependencyHealth>) -> Self {
        let status = Self::aggregate_status(&dependencies);
        Self {
            status,
            version,
            uptime_seconds,
            dependencies,
        }
    }

    fn aggregate_status(dependencies: &[DependencyHealth]) -> HealthStatus {
        if dependencies.iter().any(|d| d.status.is_unhealthy()) {
            HealthStatus::Unhealthy
        } else if dependencies.iter().any(|d| d.status.is_degraded()) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Probes the process-wide dependencies: Postgres, Redis, Kafka.
pub struct HealthChecker {
    pool: PgPool,
    redis_client: redis::Client,
    kafka_client: Option<Arc<rskafka::client::Client>>,
    start_time: std::time::Instant,
}

impl HealthChecker {
    pub fn new(
        pool: PgPool,
        redis_client: redis::Client,
        kafka_client: Option<Arc<rskafka::client::Client>>,
    ) -> Self {
        Self {
            pool,
            redis_client,
            kafka_client,
            start_time: std::time::Instant::now(),
        }
    }

    pub async fn check_all(&self) -> AggregatedHealth {
        let dependencies = vec![
            self.check_database().await,
            self.check_redis().await,
            self.check_kafka(),
        ];

        AggregatedHealth::new(
            env!("CARGO_PKG_VERSION").to_string(),
            self.start_time.elapsed().as_secs(),
            dependencies,
        )
    }

    pub async fn check_database(&self) -> DependencyHealth {
        let start = std::time::Instant::now();

        match tokio::time::timeout(
            Duration::from_secs(5),
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await
        {
            Ok(Ok(_)) => {
                let latency = start.elapsed().as_secs_f64() * 1000.0;
                if latency > 100.0 {
                    DependencyHealth::degraded("database", latency, "High latency detected")
                } else {
                    DependencyHealth::healthy("database", latency)
                }
            }
            Ok(Err(e)) => DependencyHealth::unhealthy("database", format!("Query failed: {}", e)),
            Err(_) => DependencyHealth::unhealthy("database", "Connection timeout"),
        }
    }

    pub async fn check_redis(&self) -> DependencyHealth {
        let start = std::time::Instant::now();

        match self.redis_client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                match tokio::time::timeout(
                    Duration::from_secs(5),
                    redis::cmd("PING").query_async::<_, ()>(&mut conn),
                )
                .await
                {
                    Ok(Ok(_)) => {
                        let latency = start.elapsed().as_secs_f64() * 1000.0;
                        if latency > 50.0 {
                            DependencyHealth::degraded("redis", latency, "High latency detected")
                        } else {
                            DependencyHealth::healthy("redis", latency)
                        }
                    }
                    Ok(Err(e)) => DependencyHealth::unhealthy("redis", format!("PING failed: {}", e)),
                    Err(_) => DependencyHealth::unhealthy("redis", "PING timeout"),
                }
            }
            Err(e) => DependencyHealth::unhealthy("redis", format!("Connection failed: {}", e)),
        }
    }

    /// Kafka is optional; a process started without it reports degraded, not
    /// unhealthy.
    pub fn check_kafka(&self) -> DependencyHealth {
        match &self.kafka_client {
            Some(_) => DependencyHealth::healthy("kafka", 0.0),
            None => DependencyHealth {
                name: "kafka".to_string(),
                status: HealthStatus::Degraded,
                latency_ms: None,
                message: Some("Not connected; events are skipped".to_string()),
            },
        }
    }
}
