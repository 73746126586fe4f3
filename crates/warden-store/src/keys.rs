//! Key builders for every entry Warden keeps in the store.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the application uses. The backend adds its own
//! deployment prefix on top of these.

use uuid::Uuid;

// ── Device keys ────────────────────────────────────────────

/// Device record, scoped by owner.
pub fn device(user_id: Uuid, device_id: &str) -> String {
    format!("device:{user_id}:{device_id}")
}

/// Set of device ids a user has logged in from.
pub fn user_devices(user_id: Uuid) -> String {
    format!("user_devices:{user_id}")
}

// ── Session keys ───────────────────────────────────────────

/// Session record.
pub fn session(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Set of session ids belonging to a user.
pub fn user_sessions(user_id: Uuid) -> String {
    format!("user_sessions:{user_id}")
}

/// Monotonic counter invalidating refresh tokens on logout-all.
pub fn user_version(user_id: Uuid) -> String {
    format!("user_ver:{user_id}")
}

// ── Refresh token keys ─────────────────────────────────────

/// Families opened for a (user, device) pair.
pub fn user_device_families(user_id: Uuid, device_id: &str) -> String {
    format!("user_device_fams:{user_id}:{device_id}")
}

/// Marker for a refresh JTI that may still be rotated.
pub fn refresh_active(jti: &str) -> String {
    format!("rt:active:{jti}")
}

/// Tombstone for a refresh JTI that was already consumed.
pub fn refresh_revoked(jti: &str) -> String {
    format!("rt:revoked:{jti}")
}

/// Set of active JTIs in a family.
pub fn family_active(family_id: &str) -> String {
    format!("rt:fam:active:{family_id}")
}

/// Block marker for a poisoned family.
pub fn family_blocked(family_id: &str) -> String {
    format!("rt:fam:blocked:{family_id}")
}

/// Rotation lease for a family.
pub fn rotation_lock(family_id: &str) -> String {
    format!("rt:lock:{family_id}")
}
