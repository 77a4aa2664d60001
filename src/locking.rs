use crate::error::{AppError, Result};
use rand::Rng;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// Contention-control strategy for reserve. All three funnel into the same
/// guarded decrement; they differ only in how concurrent reserves queue up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationStrategyKind {
    /// Redis lock keyed by room and first night. Reference strategy.
    #[default]
    DistributedLock,
    /// SELECT ... FOR UPDATE on the stay's availability rows.
    PessimisticRowLock,
    /// Version-guarded decrement with bounded retry.
    OptimisticVersion,
}

const ACQUIRE_RETRY_BASE_MS: u64 = 100;
const ACQUIRE_RETRY_JITTER_MS: u64 = 50;

/// Redis-backed distributed lock. SET NX PX to acquire, token-checked delete
/// to release. The lease bounds how long a crashed holder can block others;
/// correctness never depends on the lock.
#[derive(Clone)]
pub struct RedisLockProvider {
    client: redis::Client,
}

impl RedisLockProvider {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Spins on SET NX until acquired or the wait budget runs out. Lock
    /// timeout is retryable; nothing was touched.
    pub async fn acquire(&self, key: &str, wait: Duration, lease: Duration) -> Result<LockGuard> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(AppError::Redis)?;

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(lease.as_millis() as u64)
                .query_async(&mut conn)
                .await
                .map_err(AppError::Redis)?;

            if acquired.is_some() {
                return Ok(LockGuard {
                    client: self.client.clone(),
                    key: key.to_string(),
                    token,
                });
            }

            let jitter = rand::thread_rng().gen_range(0..ACQUIRE_RETRY_JITTER_MS);
            let backoff = Duration::from_millis(ACQUIRE_RETRY_BASE_MS + jitter);
            if Instant::now() + backoff >= deadline {
                return Err(AppError::LockTimeout(key.to_string()));
            }
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Held lock. Release checks the token so a holder that outlived its lease
/// cannot delete a successor's lock.
pub struct LockGuard {
    client: redis::Client,
    key: String,
    token: String,
}

impl LockGuard {
    pub async fn release(self) {
        let script = redis::Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('DEL', KEYS[1])
            else
                return 0
            end
            "#,
        );

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Lock release skipped, Redis unreachable; lease will expire it");
                return;
            }
        };

        let released: std::result::Result<i64, redis::RedisError> = script
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await;

        match released {
            Ok(0) => warn!(key = %self.key, "Lock already expired or taken over before release"),
            Ok(_) => {}
            Err(e) => {
                warn!(key = %self.key, error = %e, "Lock release failed; lease will expire it");
            }
        }
    }
}

/// Lock key for a reserve request: room plus first night, giving one
/// canonical lock per contended stay prefix.
pub fn reservation_lock_key(room_id: Uuid, first_date: chrono::NaiveDate) -> String {
    format!("room:{}:{}", room_id, first_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn lock_key_is_room_and_first_date() {
        let room_id = Uuid::nil();
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(
            reservation_lock_key(room_id, date),
            "room:00000000-0000-0000-0000-000000000000:2026-02-01"
        );
    }

    #[test]
    fn strategy_kind_parses_kebab_case() {
        let kind: ReservationStrategyKind =
            serde_json::from_str("\"pessimistic-row-lock\"").unwrap();
        assert_eq!(kind, ReservationStrategyKind::PessimisticRowLock);
        assert_eq!(
            ReservationStrategyKind::default(),
            ReservationStrategyKind::DistributedLock
        );
    }
}
