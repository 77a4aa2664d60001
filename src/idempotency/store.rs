use crate::error::{AppError, Result};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::warn;

/// Durable idempotency store backed by the owning service's own database.
/// Inventory and Payment each get their own table; the stores are
/// intentionally not shared across the service boundary.
pub struct PostgresIdempotencyStore {
    pool: PgPool,
    table: &'static str,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool, table: &'static str) -> Self {
        Self { pool, table }
    }

    /// Reads the memoized response. A database failure here means the
    /// request must not proceed: "no answer" is not "not yet processed".
    pub async fn find(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(&format!(
            r#"
            SELECT response_json
            FROM {}
            WHERE idempotency_key = $1
            "#,
            self.table
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::ServiceUnavailable(format!("idempotency store read failed: {}", e))
        })?;

        Ok(row.map(|(json,)| json))
    }

    /// Inserts the memo inside the caller's transaction, in the same commit
    /// as the effect it memoizes. Returns false when a concurrent request
    /// with the same key won the insert race; the caller rolls back and
    /// re-reads the winner's response.
    pub async fn insert(
        conn: &mut PgConnection,
        table: &'static str,
        key: &str,
        response: &serde_json::Value,
    ) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (idempotency_key, response_json, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
            table
        ))
        .bind(key)
        .bind(response)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

/// Optional Redis read accelerator in front of the durable store. Only ever
/// consulted to speed up hits; every miss or transport error falls through.
pub struct RedisIdempotencyCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisIdempotencyCache {
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn make_key(&self, idempotency_key: &str) -> String {
        format!("{}:{}", self.key_prefix, idempotency_key)
    }

    pub async fn get(&self, idempotency_key: &str) -> Result<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(AppError::Redis)?;

        let value: Option<String> = conn
            .get(self.make_key(idempotency_key))
            .await
            .map_err(AppError::Redis)?;

        Ok(value)
    }

    pub async fn set(&self, idempotency_key: &str, response: &str, ttl_seconds: i64) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(AppError::Redis)?;

        let _: () = conn
            .set_ex(self.make_key(idempotency_key), response, ttl_seconds as u64)
            .await
            .map_err(AppError::Redis)?;

        Ok(())
    }
}

/// The idempotency layer shared by Inventory and Payment: durable store as
/// source of truth, fast cache as accelerator.
pub struct IdempotencyStore {
    postgres: PostgresIdempotencyStore,
    cache: Option<RedisIdempotencyCache>,
    cache_ttl_seconds: i64,
}

impl IdempotencyStore {
    pub fn new(
        postgres: PostgresIdempotencyStore,
        cache: Option<RedisIdempotencyCache>,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            postgres,
            cache,
            cache_ttl_seconds,
        }
    }

    /// Read path. Cache hit wins; cache miss or cache error falls through to
    /// the durable store; a durable-store error fails the request with
    /// ServiceUnavailable.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if let Some(cache) = &self.cache {
            match cache.get(key).await {
                Ok(Some(cached)) => match serde_json::from_str::<T>(&cached) {
                    Ok(response) => return Ok(Some(response)),
                    Err(e) => {
                        warn!(key, error = %e, "Discarding undecodable cached idempotency response");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(key, error = %e, "Idempotency fast cache unreachable, falling back to durable store");
                }
            }
        }

        match self.postgres.find(key).await? {
            Some(json) => {
                let response = serde_json::from_value(json).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!(
                        "stored idempotency response does not decode: {}",
                        e
                    ))
                })?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }

    /// Write path, first half: memoize the response inside the effect's own
    /// transaction. Returns false when another request with this key won.
    pub async fn record<T: Serialize>(
        &self,
        conn: &mut PgConnection,
        key: &str,
        response: &T,
    ) -> Result<bool> {
        let json = serde_json::to_value(response)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("response not serializable: {}", e)))?;
        PostgresIdempotencyStore::insert(conn, self.postgres.table(), key, &json).await
    }

    /// Write path, second half: best-effort cache warm after the commit.
    /// Failure is logged and ignored.
    pub async fn warm<T: Serialize>(&self, key: &str, response: &T) {
        let Some(cache) = &self.cache else {
            return;
        };
        let json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Skipping cache warm, response not serializable");
                return;
            }
        };
        if let Err(e) = cache.set(key, &json, self.cache_ttl_seconds).await {
            warn!(key, error = %e, "Idempotency cache warm failed");
        }
    }

    /// Re-reads the durable store after losing the insert race.
    pub async fn reread<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.lookup(key).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "idempotency key {} lost the insert race but has no stored response",
                key
            ))
        })
    }
}
