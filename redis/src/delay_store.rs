//! Redis sorted-set delay store.
//!
//! # Commands
//!
//! - insert → `ZADD key score member`
//! - due → `ZRANGEBYSCORE key -inf now WITHSCORES`
//! - reschedule → Lua `ZSCORE` check then `ZADD`, atomic on the server
//! - remove → `ZREM key member` (reply 1 means this caller removed it)
//! - len → `ZCARD key`

use async_trait::async_trait;
use event_notify_core::delay_store::{DelayStore, DelayStoreError, DueEntry};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Delay store backed by one Redis sorted set.
#[derive(Clone)]
pub struct RedisDelayStore {
    /// Connection manager for connection pooling
    conn_manager: ConnectionManager,
    /// Sorted set key
    key: String,
}

impl RedisDelayStore {
    /// Connect to Redis and use the sorted set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError::ConnectionFailed`] if the URL is invalid or
    /// Redis is unreachable.
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, DelayStoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            DelayStoreError::ConnectionFailed(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            DelayStoreError::ConnectionFailed(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        Ok(Self::from_manager(conn_manager, key))
    }

    /// Use an existing connection manager.
    #[must_use]
    pub fn from_manager(conn_manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn_manager,
            key: key.into(),
        }
    }

    /// The sorted set key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Compare-and-set of one member's score.
///
/// KEYS[1] = sorted set, ARGV = member, expected score, new score.
const RESCHEDULE_SCRIPT: &str = r"
    local current = redis.call('ZSCORE', KEYS[1], ARGV[1])
    if current and tonumber(current) == tonumber(ARGV[2]) then
        redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
        return 1
    end
    return 0
";

fn command_failed(command: &'static str) -> impl FnOnce(redis::RedisError) -> DelayStoreError {
    move |e| DelayStoreError::CommandFailed {
        command,
        reason: e.to_string(),
    }
}

#[async_trait]
impl DelayStore for RedisDelayStore {
    async fn insert(&self, member: &str, score: i64) -> Result<(), DelayStoreError> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .zadd(&self.key, member, score)
            .await
            .map_err(command_failed("ZADD"))?;

        tracing::debug!(key = %self.key, score, "Inserted scheduled entry");
        Ok(())
    }

    async fn due(&self, now_ms: i64) -> Result<Vec<DueEntry>, DelayStoreError> {
        let mut conn = self.conn_manager.clone();

        let entries: Vec<(String, f64)> = conn
            .zrangebyscore_withscores(&self.key, "-inf", now_ms)
            .await
            .map_err(command_failed("ZRANGEBYSCORE"))?;

        // Epoch milliseconds are well inside f64's exact integer range
        #[allow(clippy::cast_possible_truncation)]
        let due = entries
            .into_iter()
            .map(|(member, score)| DueEntry::new(member, score as i64))
            .collect();

        Ok(due)
    }

    async fn reschedule(
        &self,
        member: &str,
        expected_score: i64,
        new_score: i64,
    ) -> Result<bool, DelayStoreError> {
        let mut conn = self.conn_manager.clone();

        let script = redis::Script::new(RESCHEDULE_SCRIPT);
        let moved: i64 = script
            .key(&self.key)
            .arg(member)
            .arg(expected_score)
            .arg(new_score)
            .invoke_async(&mut conn)
            .await
            .map_err(command_failed("EVALSHA"))?;

        Ok(moved > 0)
    }

    async fn remove(&self, member: &str) -> Result<bool, DelayStoreError> {
        let mut conn = self.conn_manager.clone();

        let removed: i64 = conn
            .zrem(&self.key, member)
            .await
            .map_err(command_failed("ZREM"))?;

        Ok(removed > 0)
    }

    async fn len(&self) -> Result<usize, DelayStoreError> {
        let mut conn = self.conn_manager.clone();

        conn.zcard(&self.key)
            .await
            .map_err(command_failed("ZCARD"))
    }
}
