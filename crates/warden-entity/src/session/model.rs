//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::SessionStatus;

/// An access-token session.
///
/// Sessions are ephemeral: each is stored with a TTL equal to the access
/// token lifetime and is superseded, not updated, by every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier embedded in the access token.
    pub session_id: String,
    /// Owning user.
    pub user_id: Uuid,
    /// Device the session was opened from.
    pub device_id: String,
    /// Client IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Client User-Agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub last_seen: DateTime<Utc>,
    /// When the session (and its access token) expires.
    pub expires_at: DateTime<Utc>,
    /// Whether a second factor was completed. Carried, not enforced.
    pub mfa: bool,
    /// Session state.
    pub status: SessionStatus,
}

impl Session {
    /// Open a session that expires together with its access token.
    pub fn open(
        session_id: impl Into<String>,
        user_id: Uuid,
        device_id: impl Into<String>,
        ip: Option<String>,
        user_agent: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            device_id: device_id.into(),
            ip,
            user_agent,
            created_at: now,
            last_seen: now,
            expires_at,
            mfa: false,
            status: SessionStatus::Active,
        }
    }
}
