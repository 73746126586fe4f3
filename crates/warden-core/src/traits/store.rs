//! Key-value store trait backing all mutable authentication state.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// A single write applied as part of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Set a string value. `None` TTL means the key never expires.
    Set {
        /// Target key.
        key: String,
        /// Value to store.
        value: String,
        /// Optional expiry.
        ttl: Option<Duration>,
    },
    /// Remove a key of any type.
    Delete {
        /// Target key.
        key: String,
    },
    /// Add a member to a set.
    SAdd {
        /// Set key.
        key: String,
        /// Member to add.
        member: String,
    },
    /// Remove a member from a set.
    SRem {
        /// Set key.
        key: String,
        /// Member to remove.
        member: String,
    },
    /// Set the TTL of an existing key.
    Expire {
        /// Target key.
        key: String,
        /// New time-to-live.
        ttl: Duration,
    },
}

/// An ordered group of writes that a store applies all-or-nothing.
///
/// No intermediate state of a batch is observable by concurrent readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<StoreOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a string write with a TTL.
    pub fn set_ex(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Duration,
    ) -> &mut Self {
        self.ops.push(StoreOp::Set {
            key: key.into(),
            value: value.into(),
            ttl: Some(ttl),
        });
        self
    }

    /// Queue a string write that never expires.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::Set {
            key: key.into(),
            value: value.into(),
            ttl: None,
        });
        self
    }

    /// Queue a key deletion.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::Delete { key: key.into() });
        self
    }

    /// Queue a set insertion.
    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Queue a set removal.
    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::SRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Queue a TTL update.
    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.ops.push(StoreOp::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    /// The queued operations, in submission order.
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Trait for key-value backends (Redis or in-memory).
///
/// The store is the single source of truth for sessions, devices and
/// refresh-token state; every coordination primitive the rotation engine
/// relies on (conditional set, per-key TTL, atomic batches) is exposed here.
/// Implementations are responsible for key prefixing and for bounding each
/// round-trip with a deadline.
#[async_trait]
pub trait KvStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a string value. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a string value. `None` TTL means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// Set a value only if the key does not already exist (NX).
    /// Returns `true` if the value was set, `false` if the key already existed.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<bool>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete a key only if it currently holds `expected`.
    /// Returns `true` if the key was removed.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Increment an integer value by 1, creating it at 1. Returns the new value.
    async fn incr(&self, key: &str) -> AppResult<i64>;

    /// Add a member to a set. Returns `true` if it was not already present.
    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool>;

    /// Remove a member from a set. Returns `true` if it was present.
    async fn srem(&self, key: &str, member: &str) -> AppResult<bool>;

    /// All members of a set (empty if the key does not exist).
    async fn smembers(&self, key: &str) -> AppResult<Vec<String>>;

    /// Apply every operation of the batch atomically.
    async fn exec(&self, batch: &WriteBatch) -> AppResult<()>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.set(key, &json, ttl).await
    }

    /// Check that the store backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
