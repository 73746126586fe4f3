//! The refresh-token family state machine.
//!
//! Per JTI: `ACTIVE -> REVOKED` (tombstone kept for the token's remaining
//! lifetime) or `ACTIVE -> expired`. Per family: `OPEN -> BLOCKED` until the
//! block marker expires. Presenting a revoked JTI is treated as replay and
//! blocks the whole family.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::config::AuthConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::{KvStore, WriteBatch};
use warden_database::UserDirectory;
use warden_entity::auth::RefreshRequest;
use warden_entity::session::{Session, TokenPair};
use warden_entity::user::User;
use warden_store::StoreManager;
use warden_store::keys;

use super::lease::FamilyLease;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{RefreshClaims, TokenCodec};
use crate::session::DeviceSessionRegistry;

/// Extra time `revoke_device` waits beyond one lease lifetime.
const LEASE_WAIT_SLACK: Duration = Duration::from_secs(1);

/// Value stored under `rt:active:{jti}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveRefresh {
    user_id: Uuid,
    device_id: String,
    family_id: String,
}

/// Everything produced by a successful issue or rotation.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Family the refresh token belongs to.
    pub family_id: String,
    /// Session bound to the access token.
    pub session_id: String,
    /// JTI of the new refresh token.
    pub refresh_jti: String,
    /// Signed refresh token.
    pub refresh_token: String,
    /// Signed access token.
    pub access_token: String,
    /// Access-token expiry (unix seconds).
    pub expires_at: i64,
}

impl From<IssuedTokens> for TokenPair {
    fn from(issued: IssuedTokens) -> Self {
        TokenPair {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_at: issued.expires_at,
        }
    }
}

/// Issues, rotates and revokes refresh-token families.
#[derive(Debug, Clone)]
pub struct RotationEngine {
    store: Arc<StoreManager>,
    users: Arc<dyn UserDirectory>,
    codec: TokenCodec,
    registry: DeviceSessionRegistry,
    access_ttl: Duration,
    refresh_ttl: Duration,
    lease_ttl: Duration,
}

/// Prefixed, time-ordered identifier.
fn new_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::now_v7().simple()).to_uppercase()
}

impl RotationEngine {
    /// Creates an engine over the given store and user directory.
    pub fn new(
        config: &AuthConfig,
        store: Arc<StoreManager>,
        users: Arc<dyn UserDirectory>,
        registry: DeviceSessionRegistry,
    ) -> Self {
        Self {
            store,
            users,
            codec: TokenCodec::new(config),
            registry,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
            lease_ttl: config.rotation_lock_ttl(),
        }
    }

    /// The codec used to sign and parse tokens.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    // ── User version ──────────────────────────────────────────

    /// Read the user version, creating it at 1 if absent.
    pub async fn ensure_user_version(&self, user_id: Uuid) -> AppResult<i64> {
        let key = keys::user_version(user_id);
        if let Some(version) = self.current_user_version(user_id).await? {
            return Ok(version);
        }
        self.store.set_nx(&key, "1", None).await?;
        // Another writer may have won the NX or bumped it since.
        self.current_user_version(user_id)
            .await?
            .ok_or_else(|| AppError::store(format!("User version for {user_id} vanished")))
    }

    /// The stored user version, if any.
    pub async fn current_user_version(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        match self.store.get(&keys::user_version(user_id)).await? {
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                AppError::store(format!("Corrupt user version for {user_id}: {raw:?}"))
            }),
            None => Ok(None),
        }
    }

    // ── Issue ─────────────────────────────────────────────────

    /// Open a new family for `(user, device)` and mint its first pair.
    ///
    /// The active record, family membership, (user, device) family index and
    /// the initial session are written in one batch.
    pub async fn issue(
        &self,
        user: &User,
        device_id: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> AuthResult<IssuedTokens> {
        let family_id = new_id("FAM_");
        let refresh_jti = Uuid::new_v4().to_string();
        let user_version = self.ensure_user_version(user.id).await?;

        let (refresh_token, _) =
            self.codec
                .sign_refresh(user.id, &refresh_jti, device_id, &family_id, user_version)?;
        let (session, access_token, expires_at) =
            self.open_session(user, device_id, ip, user_agent)?;

        let record = ActiveRefresh {
            user_id: user.id,
            device_id: device_id.to_string(),
            family_id: family_id.clone(),
        };
        let family_set = keys::family_active(&family_id);
        let family_index = keys::user_device_families(user.id, device_id);

        let mut batch = WriteBatch::new();
        batch
            .set_ex(
                keys::refresh_active(&refresh_jti),
                serde_json::to_string(&record).map_err(AppError::from)?,
                self.refresh_ttl,
            )
            .sadd(family_set.as_str(), refresh_jti.as_str())
            .expire(family_set, self.refresh_ttl)
            .sadd(family_index.as_str(), family_id.as_str())
            .expire(family_index, self.refresh_ttl);
        self.registry
            .stage_session(&mut batch, &session, self.access_ttl)?;
        self.store.exec(&batch).await?;

        info!(
            user_id = %user.id,
            device_id,
            family_id = %family_id,
            session_id = %session.session_id,
            "Issued new refresh family"
        );

        Ok(IssuedTokens {
            family_id,
            session_id: session.session_id,
            refresh_jti,
            refresh_token,
            access_token,
            expires_at,
        })
    }

    // ── Rotate ────────────────────────────────────────────────

    /// Consume one refresh token and mint its successor in the same family.
    pub async fn rotate(&self, request: &RefreshRequest) -> AuthResult<IssuedTokens> {
        let claims = self.codec.parse_refresh(&request.refresh_token)?;
        let family_id = match claims.fam.as_deref() {
            Some(fam) if !fam.is_empty() => fam.to_string(),
            _ => return Err(AuthError::InvalidToken),
        };

        self.check_token_state(&claims, &family_id).await?;

        if let Some(token_version) = claims.uv {
            let stored = self.current_user_version(claims.sub).await?;
            if stored != Some(token_version) {
                debug!(
                    user_id = %claims.sub,
                    token_version,
                    stored_version = ?stored,
                    "Refresh token predates logout-all"
                );
                return Err(AuthError::InvalidToken);
            }
        }

        let user = self
            .users
            .get_user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let Some(lease) =
            FamilyLease::acquire(self.store.clone(), &family_id, self.lease_ttl).await?
        else {
            debug!(family_id = %family_id, "Rotation already in progress for family");
            return Err(AuthError::RotationRace);
        };

        let outcome = self.rotate_under_lease(&claims, &family_id, &user, request).await;

        if let Err(e) = lease.release().await {
            warn!(family_id = %family_id, error = %e, "Failed to release rotation lease");
        }
        outcome
    }

    async fn rotate_under_lease(
        &self,
        claims: &RefreshClaims,
        family_id: &str,
        user: &User,
        request: &RefreshRequest,
    ) -> AuthResult<IssuedTokens> {
        // A previous lease holder may have consumed this JTI since the
        // unlocked checks ran.
        self.check_token_state(claims, family_id).await?;

        let user_version = match claims.uv {
            Some(version) => version,
            None => self.ensure_user_version(user.id).await?,
        };
        let tombstone_ttl = Duration::from_secs(claims.remaining_ttl_seconds().max(1));

        let refresh_jti = Uuid::new_v4().to_string();
        let (refresh_token, _) = self.codec.sign_refresh(
            user.id,
            &refresh_jti,
            &claims.did,
            family_id,
            user_version,
        )?;
        let (session, access_token, expires_at) = self.open_session(
            user,
            &claims.did,
            request.ip.clone(),
            request.user_agent.clone(),
        )?;

        let record = ActiveRefresh {
            user_id: user.id,
            device_id: claims.did.clone(),
            family_id: family_id.to_string(),
        };
        let family_set = keys::family_active(family_id);

        let mut batch = WriteBatch::new();
        batch
            .delete(keys::refresh_active(&claims.jti))
            .srem(family_set.as_str(), claims.jti.as_str())
            .set_ex(keys::refresh_revoked(&claims.jti), "1", tombstone_ttl)
            .set_ex(
                keys::refresh_active(&refresh_jti),
                serde_json::to_string(&record).map_err(AppError::from)?,
                self.refresh_ttl,
            )
            .sadd(family_set.as_str(), refresh_jti.as_str())
            .expire(family_set, self.refresh_ttl)
            .expire(
                keys::user_device_families(user.id, &claims.did),
                self.refresh_ttl,
            );
        self.registry
            .stage_session(&mut batch, &session, self.access_ttl)?;
        self.store.exec(&batch).await?;

        // logout-all does not take family leases. If it bumped the version
        // while this batch was in flight, its session sweep may have run
        // before the new session existed, so retract what was just written.
        if self.current_user_version(user.id).await? != Some(user_version) {
            let mut undo = WriteBatch::new();
            undo.delete(keys::refresh_active(&refresh_jti))
                .srem(keys::family_active(family_id), refresh_jti.as_str())
                .set_ex(keys::refresh_revoked(&refresh_jti), "1", self.refresh_ttl)
                .delete(keys::session(&session.session_id))
                .srem(keys::user_sessions(user.id), session.session_id.as_str());
            self.store.exec(&undo).await?;
            warn!(
                user_id = %user.id,
                family_id,
                jti = %refresh_jti,
                "Rotation overtaken by logout-all; retracted"
            );
            return Err(AuthError::InvalidToken);
        }

        info!(
            user_id = %user.id,
            family_id,
            old_jti = %claims.jti,
            new_jti = %refresh_jti,
            "Rotated refresh token"
        );

        Ok(IssuedTokens {
            family_id: family_id.to_string(),
            session_id: session.session_id,
            refresh_jti,
            refresh_token,
            access_token,
            expires_at,
        })
    }

    /// Blocked family, then tombstone (reuse), then liveness.
    async fn check_token_state(&self, claims: &RefreshClaims, family_id: &str) -> AuthResult<()> {
        if self.store.exists(&keys::family_blocked(family_id)).await? {
            warn!(
                user_id = %claims.sub,
                family_id,
                jti = %claims.jti,
                "Refresh attempted on blocked family"
            );
            return Err(AuthError::FamilyBlocked);
        }

        if self.store.exists(&keys::refresh_revoked(&claims.jti)).await? {
            self.store
                .set(
                    &keys::family_blocked(family_id),
                    "1",
                    Some(self.refresh_ttl),
                )
                .await?;
            warn!(
                user_id = %claims.sub,
                family_id,
                jti = %claims.jti,
                "Refresh token reuse detected; family blocked"
            );
            return Err(AuthError::RefreshRevoked);
        }

        if !self.store.exists(&keys::refresh_active(&claims.jti)).await? {
            return Err(AuthError::RefreshNotActive);
        }
        Ok(())
    }

    /// Build a fresh session and the access token bound to it.
    fn open_session(
        &self,
        user: &User,
        device_id: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<(Session, String, i64)> {
        let session_id = new_id("SID_");
        let access_jti = Uuid::new_v4().to_string();
        let (access_token, expires_at) =
            self.codec
                .sign_access(user, &session_id, device_id, &access_jti)?;

        let expiry = DateTime::<Utc>::from_timestamp(expires_at, 0).unwrap_or_else(Utc::now);
        let session = Session::open(session_id, user.id, device_id, ip, user_agent, expiry);
        Ok((session, access_token, expires_at))
    }

    // ── Revoke ────────────────────────────────────────────────

    /// Block every family of `(user, device)`, tombstone their active JTIs,
    /// mark the device blocked and delete its sessions. Returns the number
    /// of families.
    ///
    /// Each family's rotation lease is held while its block is written, so a
    /// rotation already past its checks commits first and has its new JTI
    /// and session revoked here.
    pub async fn revoke_device(&self, user_id: Uuid, device_id: &str) -> AuthResult<usize> {
        let family_index = keys::user_device_families(user_id, device_id);
        let families = self.store.smembers(&family_index).await?;

        let mut leases = Vec::with_capacity(families.len());
        for family_id in &families {
            match FamilyLease::acquire_within(
                self.store.clone(),
                family_id,
                self.lease_ttl,
                self.lease_ttl + LEASE_WAIT_SLACK,
            )
            .await?
            {
                Some(lease) => leases.push(lease),
                None => {
                    warn!(
                        user_id = %user_id,
                        device_id,
                        family_id = %family_id,
                        "Could not quiesce family rotation for revocation"
                    );
                    return Err(AuthError::RotationRace);
                }
            }
        }

        let mut batch = WriteBatch::new();
        for family_id in &families {
            batch.set_ex(keys::family_blocked(family_id), "1", self.refresh_ttl);
            let family_set = keys::family_active(family_id);
            for jti in self.store.smembers(&family_set).await? {
                batch
                    .delete(keys::refresh_active(&jti))
                    .set_ex(keys::refresh_revoked(&jti), "1", self.refresh_ttl);
            }
            batch.delete(family_set);
        }
        batch.delete(family_index);
        self.store.exec(&batch).await?;

        for lease in leases {
            if let Err(e) = lease.release().await {
                warn!(user_id = %user_id, device_id, error = %e, "Failed to release rotation lease");
            }
        }

        if let Some(mut device) = self.registry.get_device(user_id, device_id).await? {
            device.block();
            self.registry.save_device(&device).await?;
        }
        let sessions = self
            .registry
            .delete_device_sessions(user_id, device_id)
            .await?;

        warn!(
            user_id = %user_id,
            device_id,
            families = families.len(),
            sessions,
            "Revoked device"
        );
        Ok(families.len())
    }
}
