//! Key-value session store configuration.

use serde::{Deserialize, Serialize};

/// Top-level store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis-specific configuration.
    #[serde(default)]
    pub redis: RedisStoreConfig,
    /// In-memory store configuration.
    #[serde(default)]
    pub memory: MemoryStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis: RedisStoreConfig::default(),
            memory: MemoryStoreConfig::default(),
        }
    }
}

/// Redis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all Warden keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Deadline applied to every store round-trip, in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

/// In-memory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Number of writes between sweeps of expired entries.
    #[serde(default = "default_sweep_interval")]
    pub sweep_every_writes: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            sweep_every_writes: default_sweep_interval(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "warden:".to_string()
}

fn default_operation_timeout() -> u64 {
    3000
}

fn default_sweep_interval() -> u64 {
    1024
}
