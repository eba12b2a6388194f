//! Redis window store - counters shared by every gateway process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use apply_core::domain::{StoreOutcome, WindowRecord, window_delta};
use apply_core::ports::{Clock, WindowStore, WindowStoreError};

const BACKEND: &str = "redis";

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Bound on connecting and on each counter operation
    pub connect_timeout: Duration,
    /// Key prefix for window keys
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            key_prefix: "apply:rl".to_string(),
        }
    }
}

/// Redis-backed fixed-window counters.
///
/// INCR and the window TTL are applied in one Lua script, so the increment
/// is atomic and only the request that opens a window sets its expiry.
pub struct RedisWindowStore {
    conn: ConnectionManager,
    config: RedisConfig,
    clock: Arc<dyn Clock>,
    script: Script,
}

impl RedisWindowStore {
    pub async fn new(config: RedisConfig, clock: Arc<dyn Clock>) -> Result<Self, WindowStoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| WindowStoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| WindowStoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| WindowStoreError::Connection(e.to_string()))?;

        // Returns: [current_count, ttl_remaining_ms]
        let script = Script::new(
            r#"
            local key = KEYS[1]
            local window_ms = tonumber(ARGV[1])

            local current = redis.call('INCR', key)
            if current == 1 then
                redis.call('PEXPIRE', key, window_ms)
            end

            local ttl = redis.call('PTTL', key)
            if ttl < 0 then
                redis.call('PEXPIRE', key, window_ms)
                ttl = window_ms
            end
            return {current, ttl}
            "#,
        );

        tracing::info!("Connected to Redis window store");

        Ok(Self {
            conn,
            config,
            clock,
            script,
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<WindowRecord, WindowStoreError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let result: Vec<i64> = tokio::time::timeout(
            self.config.connect_timeout,
            self.script
                .key(&redis_key)
                .arg(window_ms)
                .invoke_async(&mut conn),
        )
        .await
        .map_err(|_| WindowStoreError::Operation("Redis operation timed out".to_string()))?
        .map_err(|e| WindowStoreError::Operation(e.to_string()))?;

        let count = result.first().copied().unwrap_or(1).max(1) as u64;
        let ttl_ms = result.get(1).copied().unwrap_or(window_ms as i64).max(1) as u64;

        Ok(WindowRecord {
            count,
            reset_at: self.clock.now() + window_delta(Duration::from_millis(ttl_ms)),
        })
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn increment_and_check(&self, key: &str, limit: u64, window: Duration) -> StoreOutcome {
        match self.increment(key, window).await {
            Ok(record) => StoreOutcome::Decided(record.decide(limit)),
            Err(e) => e.into_degraded(BACKEND),
        }
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}
