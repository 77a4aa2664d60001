use serde::Deserialize;
use std::time::Duration;

use crate::locking::ReservationStrategyKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub kafka: KafkaSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub booking: BookingSettings,
    #[serde(default)]
    pub payment_gateway: GatewaySettings,
    #[serde(default)]
    pub remote: RemoteCallSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
}

/// Knobs for the booking pipeline: hold lifetime, worker cadences,
/// idempotency cache, and the reservation lock.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingSettings {
    #[serde(default = "default_hold_ttl_minutes")]
    pub hold_ttl_minutes: i64,
    #[serde(default = "default_hold_reaper_interval_ms")]
    pub hold_reaper_interval_ms: u64,
    #[serde(default = "default_recovery_interval_ms")]
    pub recovery_interval_ms: u64,
    #[serde(default = "default_recovery_stuck_minutes")]
    pub recovery_stuck_minutes: i64,
    #[serde(default = "default_recovery_give_up_minutes")]
    pub recovery_give_up_minutes: i64,
    #[serde(default = "default_fast_cache_enabled")]
    pub idempotency_fast_cache_enabled: bool,
    #[serde(default = "default_fast_cache_ttl_hours")]
    pub idempotency_fast_cache_ttl_hours: i64,
    #[serde(default = "default_lock_wait_seconds")]
    pub reservation_lock_wait_seconds: u64,
    #[serde(default = "default_lock_lease_seconds")]
    pub reservation_lock_lease_seconds: u64,
    #[serde(default)]
    pub reservation_strategy: ReservationStrategyKind,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: default_hold_ttl_minutes(),
            hold_reaper_interval_ms: default_hold_reaper_interval_ms(),
            recovery_interval_ms: default_recovery_interval_ms(),
            recovery_stuck_minutes: default_recovery_stuck_minutes(),
            recovery_give_up_minutes: default_recovery_give_up_minutes(),
            idempotency_fast_cache_enabled: default_fast_cache_enabled(),
            idempotency_fast_cache_ttl_hours: default_fast_cache_ttl_hours(),
            reservation_lock_wait_seconds: default_lock_wait_seconds(),
            reservation_lock_lease_seconds: default_lock_lease_seconds(),
            reservation_strategy: ReservationStrategyKind::default(),
        }
    }
}

impl BookingSettings {
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.hold_reaper_interval_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }

    pub fn stuck_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.recovery_stuck_minutes)
    }

    pub fn give_up_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.recovery_give_up_minutes)
    }

    pub fn fast_cache_ttl_seconds(&self) -> i64 {
        self.idempotency_fast_cache_ttl_hours * 3600
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.reservation_lock_wait_seconds)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.reservation_lock_lease_seconds)
    }
}

/// Simulated payment gateway tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_success_rate")]
    pub success_rate: f64,
    #[serde(default = "default_gateway_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_gateway_max_latency_ms")]
    pub max_latency_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            success_rate: default_gateway_success_rate(),
            min_latency_ms: default_gateway_min_latency_ms(),
            max_latency_ms: default_gateway_max_latency_ms(),
        }
    }
}

/// Deadlines and retry policy for calls between the booking, inventory and
/// payment services.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCallSettings {
    #[serde(default = "default_inventory_base_url")]
    pub inventory_base_url: String,
    #[serde(default = "default_payment_base_url")]
    pub payment_base_url: String,
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for RemoteCallSettings {
    fn default() -> Self {
        Self {
            inventory_base_url: default_inventory_base_url(),
            payment_base_url: default_payment_base_url(),
            call_timeout_seconds: default_call_timeout_seconds(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl RemoteCallSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

fn default_hold_ttl_minutes() -> i64 {
    15
}

fn default_hold_reaper_interval_ms() -> u64 {
    60_000
}

fn default_recovery_interval_ms() -> u64 {
    300_000
}

fn default_recovery_stuck_minutes() -> i64 {
    10
}

fn default_recovery_give_up_minutes() -> i64 {
    1_440
}

fn default_fast_cache_enabled() -> bool {
    true
}

fn default_fast_cache_ttl_hours() -> i64 {
    24
}

fn default_lock_wait_seconds() -> u64 {
    5
}

fn default_lock_lease_seconds() -> u64 {
    30
}

fn default_gateway_success_rate() -> f64 {
    0.95
}

fn default_gateway_min_latency_ms() -> u64 {
    50
}

fn default_gateway_max_latency_ms() -> u64 {
    200
}

fn default_inventory_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_payment_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_call_timeout_seconds() -> u64 {
    5
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_defaults_match_documented_values() {
        let settings = BookingSettings::default();
        assert_eq!(settings.hold_ttl_minutes, 15);
        assert_eq!(settings.hold_reaper_interval_ms, 60_000);
        assert_eq!(settings.recovery_interval_ms, 300_000);
        assert_eq!(settings.recovery_stuck_minutes, 10);
        assert_eq!(settings.recovery_give_up_minutes, 1_440);
        assert!(settings.idempotency_fast_cache_enabled);
        assert_eq!(settings.idempotency_fast_cache_ttl_hours, 24);
        assert_eq!(settings.reservation_lock_wait_seconds, 5);
        assert_eq!(settings.reservation_lock_lease_seconds, 30);
    }

    #[test]
    fn derived_durations() {
        let settings = BookingSettings::default();
        assert_eq!(settings.hold_ttl(), chrono::Duration::minutes(15));
        assert_eq!(settings.reaper_interval(), Duration::from_secs(60));
        assert_eq!(settings.fast_cache_ttl_seconds(), 86_400);
    }
}
