//! Credential hashing capability.

use crate::config::PasswordAlgorithm;
use crate::result::AppResult;

/// Password hashing strategy.
///
/// Digests are self-describing encoded strings, so a verifier can be chosen
/// from the digest prefix alone.
pub trait CredentialHasher: Send + Sync + std::fmt::Debug {
    /// The algorithm this hasher produces.
    fn algorithm(&self) -> PasswordAlgorithm;

    /// Hash a plaintext password into an encoded digest.
    fn hash(&self, password: &str) -> AppResult<String>;

    /// Check a plaintext password against an encoded digest.
    ///
    /// Returns `Ok(false)` on mismatch; errors are reserved for malformed
    /// digests and backend failures.
    fn verify(&self, password: &str, digest: &str) -> AppResult<bool>;

    /// Whether the digest was produced with weaker parameters (or another
    /// algorithm) than this hasher is configured for.
    fn rehash_needed(&self, digest: &str) -> bool;
}
