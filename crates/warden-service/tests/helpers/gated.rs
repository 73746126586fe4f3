//! A store wrapper that can hold one session-writing batch at the commit
//! point, so tests can interleave other operations with an in-flight refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use warden_core::result::AppResult;
use warden_core::traits::{KvStore, StoreOp, WriteBatch};
use warden_store::memory::MemoryStoreProvider;

#[derive(Debug, Default)]
pub struct GatedStore {
    inner: MemoryStoreProvider,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl GatedStore {
    /// Hold the next batch that writes a session record.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once an armed batch is waiting.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the held batch commit.
    pub fn release(&self) {
        self.release.notify_one();
    }

    fn writes_session(batch: &WriteBatch) -> bool {
        batch
            .ops()
            .iter()
            .any(|op| matches!(op, StoreOp::Set { key, .. } if key.starts_with("session:")))
    }
}

#[async_trait]
impl KvStore for GatedStore {
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
        if Self::writes_session(batch) && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.exec(batch).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
