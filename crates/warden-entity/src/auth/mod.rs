//! Inbound authentication commands.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceMeta;

/// Credentials plus client context for a login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCommand {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Device identifier; generated when absent.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Client-reported device metadata.
    #[serde(default)]
    pub device_meta: DeviceMeta,
    /// Client IP address.
    #[serde(default)]
    pub ip: Option<String>,
    /// Client User-Agent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A refresh token presented for rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// The refresh token being consumed.
    pub refresh_token: String,
    /// Client IP address recorded on the new session.
    #[serde(default)]
    pub ip: Option<String>,
    /// Client User-Agent recorded on the new session.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl RefreshRequest {
    /// A request carrying only the token.
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            ip: None,
            user_agent: None,
        }
    }
}

/// Request to sign a single device out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutDeviceRequest {
    /// Owning user.
    pub user_id: Uuid,
    /// Device to sign out.
    pub device_id: String,
}

/// Profile data for a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCommand {
    /// Full name.
    pub full_name: String,
    /// Profile text.
    #[serde(default)]
    pub bio: String,
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}
