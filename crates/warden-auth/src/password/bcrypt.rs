//! bcrypt password hashing.

use warden_core::config::{PasswordAlgorithm, PasswordConfig};
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::CredentialHasher;

/// bcrypt hasher producing `$2b$` digests. A configured pepper is appended
/// to the password before hashing.
#[derive(Clone)]
pub struct BcryptHasher {
    cost: u32,
    pepper: String,
}

impl std::fmt::Debug for BcryptHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcryptHasher")
            .field("cost", &self.cost)
            .field("peppered", &!self.pepper.is_empty())
            .finish()
    }
}

impl BcryptHasher {
    /// Creates a hasher with the configured work factor.
    pub fn new(config: &PasswordConfig) -> Self {
        Self {
            cost: config.bcrypt_cost,
            pepper: config.pepper.clone(),
        }
    }

    fn preimage(&self, password: &str) -> String {
        format!("{password}{}", self.pepper)
    }
}

/// Work factor encoded in a `$2x$NN$...` digest.
fn digest_cost(digest: &str) -> Option<u32> {
    let mut parts = digest.split('$');
    let _ = parts.next()?;
    let variant = parts.next()?;
    if !matches!(variant, "2a" | "2b" | "2y") {
        return None;
    }
    parts.next()?.parse().ok()
}

impl CredentialHasher for BcryptHasher {
    fn algorithm(&self) -> PasswordAlgorithm {
        PasswordAlgorithm::Bcrypt
    }

    fn hash(&self, password: &str) -> AppResult<String> {
        ::bcrypt::hash(self.preimage(password), self.cost)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, digest: &str) -> AppResult<bool> {
        ::bcrypt::verify(self.preimage(password), digest)
            .map_err(|e| AppError::internal(format!("Invalid bcrypt digest: {e}")))
    }

    fn rehash_needed(&self, digest: &str) -> bool {
        digest_cost(digest).is_none_or(|cost| cost < self.cost)
    }
}
