//! Per-family rotation lease.
//!
//! A lease is a `SET NX` entry with a short TTL whose value is a random
//! holder token. Release deletes the entry only if it still holds that
//! token, so a holder whose lease already expired cannot remove a
//! successor's lease.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use warden_core::result::AppResult;
use warden_core::traits::KvStore;
use warden_store::StoreManager;
use warden_store::keys;

/// Delay between attempts in [`FamilyLease::acquire_within`].
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exclusive, time-bounded claim on a refresh-token family.
///
/// Dropping a lease that was not released (early return, panic, cancelled
/// future) schedules the release on the current Tokio runtime.
#[derive(Debug)]
pub struct FamilyLease {
    store: Arc<StoreManager>,
    key: String,
    holder: String,
    released: bool,
}

impl FamilyLease {
    /// Try to take the lease for `family_id`. Returns `None` if another
    /// holder has it.
    pub async fn acquire(
        store: Arc<StoreManager>,
        family_id: &str,
        ttl: Duration,
    ) -> AppResult<Option<Self>> {
        let key = keys::rotation_lock(family_id);
        let holder = Uuid::new_v4().to_string();

        if !store.set_nx(&key, &holder, Some(ttl)).await? {
            return Ok(None);
        }

        debug!(family_id, "Acquired rotation lease");
        Ok(Some(Self {
            store,
            key,
            holder,
            released: false,
        }))
    }

    /// Like [`acquire`](Self::acquire), but keep polling until `wait` has
    /// elapsed. A live holder's lease always expires within its TTL, so a
    /// `wait` of at least the lease TTL only fails if others keep taking it.
    pub async fn acquire_within(
        store: Arc<StoreManager>,
        family_id: &str,
        ttl: Duration,
        wait: Duration,
    ) -> AppResult<Option<Self>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lease) = Self::acquire(store.clone(), family_id, ttl).await? {
                return Ok(Some(lease));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Release the lease. Returns `false` if it had already expired or
    /// passed to another holder.
    pub async fn release(mut self) -> AppResult<bool> {
        let result = self.store.delete_if_eq(&self.key, &self.holder).await;
        self.released = result.is_ok();
        result
    }
}

impl Drop for FamilyLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "Rotation lease dropped outside a runtime; left to expire");
            return;
        };

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let holder = std::mem::take(&mut self.holder);
        runtime.spawn(async move {
            if let Err(e) = store.delete_if_eq(&key, &holder).await {
                warn!(key = %key, error = %e, "Deferred lease release failed; left to expire");
            }
        });
    }
}
