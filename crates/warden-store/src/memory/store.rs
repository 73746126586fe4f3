//! In-memory store implementation.
//!
//! All state sits behind a single async mutex, so every operation (and every
//! batch) is linearizable. Expired entries are dropped lazily on access and
//! by a periodic sweep driven by the write count.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use warden_core::config::MemoryStoreConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::{KvStore, StoreOp, WriteBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Set,
}

#[derive(Debug)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

impl Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::Set(_) => Kind::Set,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    writes: u64,
}

impl State {
    /// Live entry for `key`, removing it first if it has expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn live_kind(&mut self, key: &str, now: Instant) -> Option<Kind> {
        self.live(key, now).map(|e| e.value.kind())
    }

    /// Reject batches that would hit a key holding the wrong type, before
    /// anything is written.
    fn check_batch(&mut self, batch: &WriteBatch, now: Instant) -> AppResult<()> {
        let mut staged: HashMap<&str, Option<Kind>> = HashMap::new();
        for op in batch.ops() {
            let (key, next) = match op {
                StoreOp::Set { key, .. } => (key.as_str(), Some(Kind::Str)),
                StoreOp::Delete { key } => (key.as_str(), None),
                StoreOp::SAdd { key, .. } | StoreOp::SRem { key, .. } => {
                    let current = match staged.get(key.as_str()) {
                        Some(kind) => *kind,
                        None => self.live_kind(key, now),
                    };
                    if current == Some(Kind::Str) {
                        return Err(wrong_type(key));
                    }
                    (key.as_str(), Some(Kind::Set))
                }
                StoreOp::Expire { .. } => continue,
            };
            staged.insert(key, next);
        }
        Ok(())
    }

    fn apply(&mut self, op: &StoreOp, now: Instant) {
        match op {
            StoreOp::Set { key, value, ttl } => {
                self.entries.insert(
                    key.clone(),
                    Entry {
                        value: Value::Str(value.clone()),
                        expires_at: ttl.map(|ttl| now + ttl),
                    },
                );
            }
            StoreOp::Delete { key } => {
                self.entries.remove(key);
            }
            StoreOp::SAdd { key, member } => {
                self.sadd(key, member, now);
            }
            StoreOp::SRem { key, member } => {
                self.srem(key, member, now);
            }
            StoreOp::Expire { key, ttl } => {
                if let Some(entry) = self.live(key, now) {
                    entry.expires_at = Some(now + *ttl);
                }
            }
        }
    }

    fn sadd(&mut self, key: &str, member: &str, now: Instant) -> bool {
        if self.live(key, now).is_none() {
            self.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                },
            );
        }
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => members.insert(member.to_string()),
            _ => false,
        }
    }

    fn srem(&mut self, key: &str, member: &str, now: Instant) -> bool {
        let (removed, now_empty) = match self.live(key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => (members.remove(member), members.is_empty()),
            _ => (false, false),
        };
        // Empty sets disappear, as in Redis.
        if now_empty {
            self.entries.remove(key);
        }
        removed
    }

    fn record_write(&mut self, sweep_every: u64, now: Instant) {
        self.writes = self.writes.wrapping_add(1);
        if sweep_every > 0 && self.writes % sweep_every == 0 {
            let before = self.entries.len();
            self.entries.retain(|_, e| !e.is_expired(now));
            let swept = before - self.entries.len();
            if swept > 0 {
                debug!(swept, "Swept expired store entries");
            }
        }
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::store(format!(
        "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
    ))
}

/// In-memory store provider.
#[derive(Debug, Clone)]
pub struct MemoryStoreProvider {
    /// Shared state.
    state: Arc<Mutex<State>>,
    /// Writes between expiry sweeps (0 disables sweeping).
    sweep_every: u64,
}

impl MemoryStoreProvider {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &MemoryStoreConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            sweep_every: config.sweep_every_writes,
        }
    }

    /// Number of entries currently held, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStoreProvider {
    fn default() -> Self {
        Self::new(&MemoryStoreConfig::default())
    }
}

#[async_trait]
impl KvStore for MemoryStoreProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut state = self.state.lock().await;
        match state.live(key, Instant::now()) {
            Some(Entry {
                value: Value::Str(v),
                ..
            }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.apply(
            &StoreOp::Set {
                key: key.to_string(),
                value: value.to_string(),
                ttl,
            },
            now,
        );
        state.record_write(self.sweep_every, now);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if state.live(key, now).is_some() {
            return Ok(false);
        }
        state.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        state.record_write(self.sweep_every, now);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.entries.remove(key);
        state.record_write(self.sweep_every, now);
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let matches = matches!(
            state.live(key, now),
            Some(Entry { value: Value::Str(v), .. }) if v.as_str() == expected
        );
        if matches {
            state.entries.remove(key);
            state.record_write(self.sweep_every, now);
        }
        Ok(matches)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.live(key, Instant::now()).is_some())
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let next = match state.live(key, now) {
            Some(Entry {
                value: Value::Str(v),
                ..
            }) => {
                let current: i64 = v.parse().map_err(|_| {
                    AppError::store(format!("Value at '{key}' is not an integer"))
                })?;
                let next = current + 1;
                *v = next.to_string();
                next
            }
            Some(_) => return Err(wrong_type(key)),
            None => {
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str("1".to_string()),
                        expires_at: None,
                    },
                );
                1
            }
        };
        state.record_write(self.sweep_every, now);
        Ok(next)
    }

    async fn sadd(&self, key: &str, member: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if state.live_kind(key, now) == Some(Kind::Str) {
            return Err(wrong_type(key));
        }
        let added = state.sadd(key, member, now);
        state.record_write(self.sweep_every, now);
        Ok(added)
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if state.live_kind(key, now) == Some(Kind::Str) {
            return Err(wrong_type(key));
        }
        let removed = state.srem(key, member, now);
        state.record_write(self.sweep_every, now);
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        let mut state = self.state.lock().await;
        match state.live(key, Instant::now()) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn exec(&self, batch: &WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.check_batch(batch, now)?;
        for op in batch.ops() {
            state.apply(op, now);
        }
        state.record_write(self.sweep_every, now);
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStoreProvider {
        MemoryStoreProvider::default()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = store();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = store();
        store
            .set("k", "v", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.exists("k").await.unwrap());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_nx_respects_expiry() {
        let store = store();
        assert!(store.set_nx("lock", "a", Some(Duration::from_secs(10))).await.unwrap());
        assert!(!store.set_nx("lock", "b", Some(Duration::from_secs(10))).await.unwrap());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.set_nx("lock", "c", Some(Duration::from_secs(10))).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_delete_if_eq_only_removes_matching_value() {
        let store = store();
        store.set("lock", "owner", None).await.unwrap();
        assert!(!store.delete_if_eq("lock", "intruder").await.unwrap());
        assert!(store.exists("lock").await.unwrap());
        assert!(store.delete_if_eq("lock", "owner").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_creates_and_increments() {
        let store = store();
        assert_eq!(store.incr("ver").await.unwrap(), 1);
        assert_eq!(store.incr("ver").await.unwrap(), 2);
        store.set("bad", "abc", None).await.unwrap();
        assert!(store.incr("bad").await.is_err());
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = store();
        assert!(store.sadd("s", "a").await.unwrap());
        assert!(!store.sadd("s", "a").await.unwrap());
        assert!(store.sadd("s", "b").await.unwrap());
        let mut members = store.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);

        assert!(store.srem("s", "a").await.unwrap());
        assert!(store.srem("s", "b").await.unwrap());
        assert!(!store.exists("s").await.unwrap());
        assert!(store.smembers("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_rejected_as_a_whole_on_wrong_type() {
        let store = store();
        store.set("str", "x", None).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.set("a", "1").sadd("str", "m");
        assert!(store.exec(&batch).await.is_err());
        assert!(!store.exists("a").await.unwrap());

        // A set that replaces the string earlier in the batch is fine.
        let mut batch = WriteBatch::new();
        batch.delete("str").sadd("str", "m").set("a", "1");
        store.exec(&batch).await.unwrap();
        assert_eq!(store.smembers("str").await.unwrap(), vec!["m"]);
        assert!(store.exists("a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_expire_applies_to_set() {
        let store = store();
        let mut batch = WriteBatch::new();
        batch
            .sadd("fam", "j1")
            .expire("fam", Duration::from_secs(3))
            .expire("missing", Duration::from_secs(3));
        store.exec(&batch).await.unwrap();
        assert!(!store.exists("missing").await.unwrap());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.smembers("fam").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_expired_entries() {
        let store = MemoryStoreProvider::new(&MemoryStoreConfig {
            sweep_every_writes: 2,
        });
        store
            .set("old", "v", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        store.set("new", "v", None).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
