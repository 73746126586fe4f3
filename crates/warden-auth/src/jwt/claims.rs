//! JWT claim sets for access and refresh tokens.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinguishes access tokens from refresh tokens (`typ` claim).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on API requests.
    Access,
    /// Long-lived token exchanged for a new pair.
    Refresh,
}

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user ID.
    pub sub: Uuid,
    /// User email at issuance.
    pub email: String,
    /// Token type, always `access`.
    pub typ: TokenType,
    /// Session this token is bound to.
    pub sid: String,
    /// Device the session was opened from.
    pub did: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Token ID.
    pub jti: String,
}

/// Claims embedded in every refresh token.
///
/// `fam` and `uv` are optional on the wire so that a token missing them is
/// reported as invalid by the rotation engine rather than failing to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject: the user ID.
    pub sub: Uuid,
    /// Token type, always `refresh`.
    pub typ: TokenType,
    /// Device the family was opened from.
    pub did: String,
    /// Family ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fam: Option<String>,
    /// User version at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<i64>,
    /// Issuer.
    pub iss: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Token ID, the key of the active/revoked records.
    pub jti: String,
}

impl RefreshClaims {
    /// Seconds left before expiry (0 if expired).
    pub fn remaining_ttl_seconds(&self) -> u64 {
        let remaining = self.exp - Utc::now().timestamp();
        if remaining > 0 { remaining as u64 } else { 0 }
    }
}
