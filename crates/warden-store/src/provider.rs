//! Store manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use warden_core::config::StoreConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::{KvStore, WriteBatch};

/// Store manager that wraps the configured key-value provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    /// The inner store provider.
    inner: Arc<dyn KvStore>,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn KvStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis store provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                let provider = crate::redis::RedisStoreProvider::new(
                    client,
                    Duration::from_millis(config.redis.operation_timeout_ms),
                );
                Arc::new(provider)
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory store provider");
                Arc::new(crate::memory::MemoryStoreProvider::new(&config.memory))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown store provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn KvStore>) -> Self {
        Self { inner: provider }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn KvStore {
        self.inner.as_ref()
    }
}

#[async_trait]
impl KvStore for StoreManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.inner.delete_if_eq(key, expected).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        self.inner.incr(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn exec(&self, batch: &WriteBatch) -> AppResult<()> {
        self.inner.exec(batch).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = StoreConfig {
            provider: "memcached".to_string(),
            ..Default::default()
        };
        let err = StoreManager::new(&config).await.unwrap_err();
        assert_eq!(err.kind, warden_core::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_memory_provider_json_roundtrip() {
        let manager = StoreManager::new(&StoreConfig::default()).await.unwrap();
        let data = serde_json::json!({"device_id": "D1", "trusted": false});
        manager.set_json("doc", &data, None).await.unwrap();
        let back: Option<serde_json::Value> = manager.get_json("doc").await.unwrap();
        assert_eq!(back, Some(data));
    }
}
