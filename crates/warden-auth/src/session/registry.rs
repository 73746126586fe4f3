//! Device and session persistence.
//!
//! Devices live for the refresh-token lifetime and are refreshed on every
//! login; sessions live for the access-token lifetime and are superseded, not
//! updated, on each refresh. Every record is paired with a membership entry
//! in a per-user index set, and the two writes always go out in one batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::result::AppResult;
use warden_core::traits::{KvStore, WriteBatch};
use warden_entity::device::Device;
use warden_entity::session::Session;
use warden_store::StoreManager;
use warden_store::keys;

/// Reads and writes device and session records.
#[derive(Debug, Clone)]
pub struct DeviceSessionRegistry {
    store: Arc<StoreManager>,
    /// Lifetime of device records and of the per-user index sets.
    record_ttl: Duration,
}

impl DeviceSessionRegistry {
    /// Creates a registry whose device records expire after `record_ttl`.
    pub fn new(store: Arc<StoreManager>, record_ttl: Duration) -> Self {
        Self { store, record_ttl }
    }

    // ── Devices ───────────────────────────────────────────────

    /// Upsert a device and index it under its user.
    pub async fn save_device(&self, device: &Device) -> AppResult<()> {
        let index = keys::user_devices(device.user_id);
        let mut batch = WriteBatch::new();
        batch
            .set_ex(
                keys::device(device.user_id, &device.device_id),
                serde_json::to_string(device)?,
                self.record_ttl,
            )
            .sadd(index.as_str(), device.device_id.as_str())
            .expire(index, self.record_ttl);
        self.store.exec(&batch).await
    }

    /// Fetch a device owned by `user_id`.
    pub async fn get_device(&self, user_id: Uuid, device_id: &str) -> AppResult<Option<Device>> {
        self.store.get_json(&keys::device(user_id, device_id)).await
    }

    /// All live devices of a user. Expired ids are pruned from the index.
    pub async fn list_devices(&self, user_id: Uuid) -> AppResult<Vec<Device>> {
        let index = keys::user_devices(user_id);
        let mut devices = Vec::new();
        for device_id in self.store.smembers(&index).await? {
            match self.get_device(user_id, &device_id).await? {
                Some(device) => devices.push(device),
                None => {
                    self.store.srem(&index, &device_id).await?;
                }
            }
        }
        devices.sort_by(|a, b| a.first_seen.cmp(&b.first_seen));
        Ok(devices)
    }

    // ── Sessions ──────────────────────────────────────────────

    /// Queue the writes that persist `session` onto an existing batch.
    pub fn stage_session(
        &self,
        batch: &mut WriteBatch,
        session: &Session,
        ttl: Duration,
    ) -> AppResult<()> {
        let index = keys::user_sessions(session.user_id);
        batch
            .set_ex(
                keys::session(&session.session_id),
                serde_json::to_string(session)?,
                ttl,
            )
            .sadd(index.as_str(), session.session_id.as_str())
            .expire(index, self.record_ttl);
        Ok(())
    }

    /// Store a session with `ttl` and index it under its user.
    pub async fn save_session(&self, session: &Session, ttl: Duration) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        self.stage_session(&mut batch, session, ttl)?;
        self.store.exec(&batch).await
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, session_id: &str) -> AppResult<Option<Session>> {
        self.store.get_json(&keys::session(session_id)).await
    }

    /// Remove a session and its index entry.
    pub async fn delete_session(&self, user_id: Uuid, session_id: &str) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch
            .delete(keys::session(session_id))
            .srem(keys::user_sessions(user_id), session_id);
        self.store.exec(&batch).await
    }

    /// All live sessions of a user. Expired ids are pruned from the index.
    pub async fn list_sessions(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let index = keys::user_sessions(user_id);
        let mut sessions = Vec::new();
        for session_id in self.store.smembers(&index).await? {
            match self.get_session(&session_id).await? {
                Some(session) => sessions.push(session),
                None => {
                    self.store.srem(&index, &session_id).await?;
                }
            }
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    /// Delete every session of `user_id` opened from `device_id`, pruning
    /// dangling index entries on the way. Returns the number deleted.
    pub async fn delete_device_sessions(&self, user_id: Uuid, device_id: &str) -> AppResult<usize> {
        let index = keys::user_sessions(user_id);
        let mut batch = WriteBatch::new();
        let mut deleted = 0;

        for session_id in self.store.smembers(&index).await? {
            match self.get_session(&session_id).await? {
                Some(session) if session.device_id == device_id => {
                    batch
                        .delete(keys::session(&session_id))
                        .srem(index.as_str(), session_id.as_str());
                    deleted += 1;
                }
                Some(_) => {}
                None => {
                    batch.srem(index.as_str(), session_id.as_str());
                }
            }
        }

        self.store.exec(&batch).await?;
        debug!(user_id = %user_id, device_id, deleted, "Deleted device sessions");
        Ok(deleted)
    }

    // ── Logout all ────────────────────────────────────────────

    /// Bump the user version, invalidating every outstanding refresh token,
    /// then delete all known sessions best-effort. Returns the new version.
    pub async fn logout_all(&self, user_id: Uuid) -> AppResult<i64> {
        let version = self.store.incr(&keys::user_version(user_id)).await?;

        let index = keys::user_sessions(user_id);
        let session_ids = match self.store.smembers(&index).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not list sessions during logout-all");
                Vec::new()
            }
        };

        let mut removed = 0usize;
        for session_id in &session_ids {
            match self.store.delete(&keys::session(session_id)).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(user_id = %user_id, session_id, error = %e, "Failed to delete session");
                }
            }
        }
        if let Err(e) = self.store.delete(&index).await {
            warn!(user_id = %user_id, error = %e, "Failed to clear session index");
        }

        info!(user_id = %user_id, version, sessions = removed, "Logged out all sessions");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use warden_entity::device::DeviceMeta;
    use warden_store::memory::MemoryStoreProvider;

    const DAY: Duration = Duration::from_secs(86_400);

    fn registry() -> (DeviceSessionRegistry, Arc<StoreManager>) {
        let store = Arc::new(StoreManager::from_provider(Arc::new(
            MemoryStoreProvider::default(),
        )));
        (DeviceSessionRegistry::new(store.clone(), DAY), store)
    }

    fn session(user_id: Uuid, sid: &str, did: &str) -> Session {
        Session::open(sid, user_id, did, None, None, Utc::now())
    }

    #[tokio::test]
    async fn test_device_round_trip_and_index() {
        let (registry, store) = registry();
        let uid = Uuid::now_v7();
        let device = Device::first_seen(uid, "D1", &DeviceMeta::default(), None);

        registry.save_device(&device).await.unwrap();
        registry.save_device(&device).await.unwrap();

        let loaded = registry.get_device(uid, "D1").await.unwrap().unwrap();
        assert_eq!(loaded, device);
        assert_eq!(
            store.smembers(&keys::user_devices(uid)).await.unwrap(),
            vec!["D1"]
        );
        assert!(registry.get_device(Uuid::now_v7(), "D1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_expire_and_are_pruned() {
        let (registry, store) = registry();
        let uid = Uuid::now_v7();

        registry
            .save_session(&session(uid, "S1", "D1"), Duration::from_secs(60))
            .await
            .unwrap();
        registry
            .save_session(&session(uid, "S2", "D1"), Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(registry.list_sessions(uid).await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(registry.get_session("S1").await.unwrap().is_none());
        let live = registry.list_sessions(uid).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].session_id, "S2");
        assert_eq!(
            store.smembers(&keys::user_sessions(uid)).await.unwrap(),
            vec!["S2"]
        );
    }

    #[tokio::test]
    async fn test_delete_session_removes_index_entry() {
        let (registry, store) = registry();
        let uid = Uuid::now_v7();
        registry.save_session(&session(uid, "S1", "D1"), DAY).await.unwrap();

        registry.delete_session(uid, "S1").await.unwrap();
        assert!(registry.get_session("S1").await.unwrap().is_none());
        assert!(store.smembers(&keys::user_sessions(uid)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_device_sessions_is_scoped() {
        let (registry, _) = registry();
        let uid = Uuid::now_v7();
        registry.save_session(&session(uid, "S1", "D1"), DAY).await.unwrap();
        registry.save_session(&session(uid, "S2", "D2"), DAY).await.unwrap();
        registry.save_session(&session(uid, "S3", "D1"), DAY).await.unwrap();

        assert_eq!(registry.delete_device_sessions(uid, "D1").await.unwrap(), 2);
        let left = registry.list_sessions(uid).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].device_id, "D2");
    }

    #[tokio::test]
    async fn test_logout_all_bumps_version_and_clears_sessions() {
        let (registry, store) = registry();
        let uid = Uuid::now_v7();
        store.set(&keys::user_version(uid), "1", None).await.unwrap();
        registry.save_session(&session(uid, "S1", "D1"), DAY).await.unwrap();
        registry.save_session(&session(uid, "S2", "D2"), DAY).await.unwrap();

        assert_eq!(registry.logout_all(uid).await.unwrap(), 2);
        assert!(registry.get_session("S1").await.unwrap().is_none());
        assert!(registry.get_session("S2").await.unwrap().is_none());
        assert!(!store.exists(&keys::user_sessions(uid)).await.unwrap());
    }
}
