//! Token signing and lifetime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token signing configuration.
///
/// Access and refresh tokens are signed with distinct HMAC-SHA256 secrets so
/// that a leaked access secret cannot forge refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for access token signing.
    pub access_secret: String,
    /// Secret key for refresh token signing.
    pub refresh_secret: String,
    /// Value of the `iss` claim, verified on parse.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,
    /// Lifetime of the per-family rotation lease in seconds.
    #[serde(default = "default_lock_ttl")]
    pub rotation_lock_seconds: u64,
    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default)]
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_minutes * 60)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_hours * 3600)
    }

    /// Rotation lease lifetime.
    pub fn rotation_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.rotation_lock_seconds)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AppError::configuration("Token secrets must not be empty"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AppError::configuration(
                "Access and refresh secrets must differ",
            ));
        }
        if self.access_ttl_minutes == 0 || self.refresh_ttl_hours == 0 {
            return Err(AppError::configuration("Token TTLs must be non-zero"));
        }
        if self.rotation_lock_seconds == 0 {
            return Err(AppError::configuration(
                "Rotation lock TTL must be non-zero",
            ));
        }
        Ok(())
    }
}

fn default_issuer() -> String {
    "warden".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    720
}

fn default_lock_ttl() -> u64 {
    10
}
