//! Device entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::DeviceStatus;

/// A client device that has logged in as a user.
///
/// One device belongs to exactly one user; the record is keyed by the
/// `(user_id, device_id)` pair so client-chosen ids cannot collide across
/// accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Owning user.
    pub user_id: Uuid,
    /// Client-supplied or server-generated identifier.
    pub device_id: String,
    /// Device class reported by the client (phone, desktop, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Operating system reported by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Last seen User-Agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// First login from this device.
    pub first_seen: DateTime<Utc>,
    /// Most recent login from this device.
    pub last_seen: DateTime<Utc>,
    /// Whether the user marked this device as trusted.
    pub trusted: bool,
    /// Device standing.
    pub status: DeviceStatus,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Device {
    /// Create a record for a device seen for the first time.
    pub fn first_seen(
        user_id: Uuid,
        device_id: impl Into<String>,
        meta: &DeviceMeta,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            device_id: device_id.into(),
            device_type: meta.device_type.clone(),
            os: meta.os.clone(),
            user_agent,
            first_seen: now,
            last_seen: now,
            trusted: false,
            status: DeviceStatus::Active,
            name: meta.name.clone(),
        }
    }

    /// Record a successful login from this device. Re-authenticating
    /// lifts a block left by a device logout.
    pub fn touch(&mut self, user_agent: Option<String>) {
        self.last_seen = Utc::now();
        self.status = DeviceStatus::Active;
        if user_agent.is_some() {
            self.user_agent = user_agent;
        }
    }

    /// Mark the device signed out. Its refresh families are blocked
    /// separately.
    pub fn block(&mut self) {
        self.status = DeviceStatus::Blocked;
    }

    /// Whether the device currently holds a usable sign-in.
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// Client-reported device metadata carried by a login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Operating system.
    #[serde(default)]
    pub os: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Device class.
    #[serde(default)]
    pub device_type: Option<String>,
}
