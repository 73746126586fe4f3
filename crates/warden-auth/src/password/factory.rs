//! Hasher selection by configuration and by digest prefix.

use warden_core::config::{PasswordAlgorithm, PasswordConfig};
use warden_core::result::AppResult;
use warden_core::traits::CredentialHasher;

use super::bcrypt::BcryptHasher;
use super::hasher::Argon2idHasher;

/// Plaintext hashed once at startup to produce the timing-equalisation digest.
const DUMMY_PASSWORD: &str = "warden::timing-equaliser";

/// Both hashing strategies, with the configured one used for new digests.
///
/// Verification dispatches on the stored digest's prefix, so users hashed
/// under a previous algorithm keep working and are flagged for rehash.
#[derive(Debug, Clone)]
pub struct HasherSet {
    primary: PasswordAlgorithm,
    argon2id: Argon2idHasher,
    bcrypt: BcryptHasher,
    dummy_digest: String,
}

impl HasherSet {
    /// Build both hashers from configuration.
    pub fn from_config(config: &PasswordConfig) -> AppResult<Self> {
        let argon2id = Argon2idHasher::new(config)?;
        let bcrypt = BcryptHasher::new(config);
        let dummy_digest = match config.algorithm {
            PasswordAlgorithm::Argon2id => argon2id.hash(DUMMY_PASSWORD)?,
            PasswordAlgorithm::Bcrypt => bcrypt.hash(DUMMY_PASSWORD)?,
        };

        Ok(Self {
            primary: config.algorithm,
            argon2id,
            bcrypt,
            dummy_digest,
        })
    }

    /// The hasher that produced `digest`.
    ///
    /// `$argon2id$` selects argon2id; `$2a$`, `$2b$`, `$2y$` and anything
    /// unrecognised fall back to bcrypt.
    pub fn detect(&self, digest: &str) -> &dyn CredentialHasher {
        if digest.starts_with("$argon2id$") {
            &self.argon2id
        } else {
            &self.bcrypt
        }
    }

    /// Spend the same work as a real verification, for unknown accounts.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_digest);
    }
}

impl CredentialHasher for HasherSet {
    fn algorithm(&self) -> PasswordAlgorithm {
        self.primary
    }

    fn hash(&self, password: &str) -> AppResult<String> {
        match self.primary {
            PasswordAlgorithm::Argon2id => self.argon2id.hash(password),
            PasswordAlgorithm::Bcrypt => self.bcrypt.hash(password),
        }
    }

    fn verify(&self, password: &str, digest: &str) -> AppResult<bool> {
        self.detect(digest).verify(password, digest)
    }

    fn rehash_needed(&self, digest: &str) -> bool {
        let current = self.detect(digest);
        current.algorithm() != self.primary || current.rehash_needed(digest)
    }
}
