//! Issued token pair.

use serde::{Deserialize, Serialize};

/// A signed access/refresh pair handed to the client.
///
/// Never persisted; minted fresh on every login and rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived, single-use refresh token.
    pub refresh_token: String,
    /// Access token expiry, unix seconds.
    pub expires_at: i64,
}
