//! Redis store provider implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::traits::{KvStore, StoreOp, WriteBatch};

use super::client::RedisClient;

/// Lua script for compare-and-delete.
///
/// KEYS[1] = key
/// ARGV[1] = expected value
///
/// Returns the number of keys removed (0 or 1).
const DELETE_IF_EQ_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Redis-backed store provider.
#[derive(Debug, Clone)]
pub struct RedisStoreProvider {
    /// Redis client.
    client: RedisClient,
    /// Deadline applied to every round-trip.
    op_timeout: Duration,
}

impl RedisStoreProvider {
    /// Create a new Redis store provider.
    pub fn new(client: RedisClient, op_timeout: Duration) -> Self {
        Self { client, op_timeout }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Store, format!("Redis error: {e}"), e)
    }

    /// Await a Redis future under the configured deadline.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(Self::map_err),
            Err(_) => {
                warn!(op, timeout = ?self.op_timeout, "Redis operation timed out");
                Err(AppError::store(format!(
                    "Redis {op} timed out after {}ms",
                    self.op_timeout.as_millis()
                )))
            }
        }
    }
}

/// Whole seconds for a TTL, rounded up and never below one.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl KvStore for RedisStoreProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: Option<String> = self.timed("GET", conn.get(&full_key)).await?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        match ttl {
            Some(ttl) => {
                let _: () = self
                    .timed("SET", conn.set_ex(&full_key, value, ttl_secs(ttl)))
                    .await?;
            }
            None => {
                let _: () = self.timed("SET", conn.set(&full_key, value)).await?;
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        // SET key value [EX ttl] NX
        let mut cmd = redis::cmd("SET");
        cmd.arg(&full_key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        cmd.arg("NX");

        let result: Option<String> = self.timed("SET NX", cmd.query_async(&mut conn)).await?;
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let _: () = self.timed("DEL", conn.del(&full_key)).await?;
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let script = redis::Script::new(DELETE_IF_EQ_SCRIPT);
        let removed: i64 = self
            .timed(
                "DELETE IF EQ",
                script.key(&full_key).arg(expected).invoke_async(&mut conn),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: bool = self.timed("EXISTS", conn.exists(&full_key)).await?;
        Ok(result)
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: i64 = self.timed("INCR", conn.incr(&full_key, 1i64)).await?;
        Ok(result)
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let added: i64 = self.timed("SADD", conn.sadd(&full_key, member)).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let removed: i64 = self.timed("SREM", conn.srem(&full_key, member)).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let members: Vec<String> = self.timed("SMEMBERS", conn.smembers(&full_key)).await?;
        Ok(members)
    }

    async fn exec(&self, batch: &WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // MULTI/EXEC so no reader observes a partial batch.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.ops() {
            match op {
                StoreOp::Set { key, value, ttl } => {
                    let full_key = self.client.prefixed_key(key);
                    match ttl {
                        Some(ttl) => pipe.set_ex(full_key, value, ttl_secs(*ttl)).ignore(),
                        None => pipe.set(full_key, value).ignore(),
                    };
                }
                StoreOp::Delete { key } => {
                    pipe.del(self.client.prefixed_key(key)).ignore();
                }
                StoreOp::SAdd { key, member } => {
                    pipe.sadd(self.client.prefixed_key(key), member).ignore();
                }
                StoreOp::SRem { key, member } => {
                    pipe.srem(self.client.prefixed_key(key), member).ignore();
                }
                StoreOp::Expire { key, ttl } => {
                    pipe.expire(self.client.prefixed_key(key), ttl_secs(*ttl) as i64)
                        .ignore();
                }
            }
        }

        let mut conn = self.client.conn_mut();
        let _: () = self.timed("EXEC", pipe.query_async(&mut conn)).await?;
        debug!(ops = batch.len(), "Applied write batch");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = self
            .timed("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(pong == "PONG")
    }
}
