//! Argon2id password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use warden_core::config::{PasswordAlgorithm, PasswordConfig};
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::CredentialHasher;

/// Argon2id hasher producing PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
///
/// The optional pepper is passed to Argon2 as its secret input, so it never
/// appears in the stored digest.
#[derive(Clone)]
pub struct Argon2idHasher {
    params: Params,
    pepper: Vec<u8>,
}

impl std::fmt::Debug for Argon2idHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2idHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .field("peppered", &!self.pepper.is_empty())
            .finish()
    }
}

impl Argon2idHasher {
    /// Creates a hasher from the argon2 section of the password config.
    pub fn new(config: &PasswordConfig) -> AppResult<Self> {
        let params = Params::new(
            config.memory_kib,
            config.time_cost,
            config.threads,
            Some(config.key_len),
        )
        .map_err(|e| AppError::configuration(format!("Invalid argon2 parameters: {e}")))?;

        Ok(Self {
            params,
            pepper: config.pepper.as_bytes().to_vec(),
        })
    }

    fn argon2(&self) -> AppResult<Argon2<'_>> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| AppError::configuration(format!("Invalid argon2 pepper: {e}")))
    }
}

impl CredentialHasher for Argon2idHasher {
    fn algorithm(&self) -> PasswordAlgorithm {
        PasswordAlgorithm::Argon2id
    }

    fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, digest: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| AppError::internal(format!("Invalid argon2 digest: {e}")))?;

        // Cost parameters come from the digest itself.
        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!(
                "Password verification failed: {e}"
            ))),
        }
    }

    fn rehash_needed(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };
        if parsed.algorithm.as_str() != "argon2id" {
            return true;
        }
        let Ok(stored) = Params::try_from(&parsed) else {
            return true;
        };
        stored.m_cost() < self.params.m_cost()
            || stored.t_cost() < self.params.t_cost()
            || stored.p_cost() != self.params.p_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap(pepper: &str, memory_kib: u32, time_cost: u32) -> Argon2idHasher {
        Argon2idHasher::new(&PasswordConfig {
            pepper: pepper.to_string(),
            memory_kib,
            time_cost,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap("", 256, 1);
        let digest = hasher.hash("Secret1!").unwrap();
        assert!(digest.starts_with("$argon2id$v=19$m=256,t=1,p=1$"));
        assert!(hasher.verify("Secret1!", &digest).unwrap());
        assert!(!hasher.verify("Secret2!", &digest).unwrap());
    }

    #[test]
    fn test_pepper_is_required_to_verify() {
        let peppered = cheap("pepper", 256, 1);
        let plain = cheap("", 256, 1);
        let digest = peppered.hash("Secret1!").unwrap();
        assert!(peppered.verify("Secret1!", &digest).unwrap());
        assert!(!plain.verify("Secret1!", &digest).unwrap());
    }

    #[test]
    fn test_rehash_needed_when_params_weaker() {
        let weak = cheap("", 256, 1);
        let strong = cheap("", 512, 2);
        let digest = weak.hash("Secret1!").unwrap();
        assert!(!weak.rehash_needed(&digest));
        assert!(strong.rehash_needed(&digest));
        assert!(strong.rehash_needed("$2b$12$not-argon"));
    }

    #[test]
    fn test_malformed_digest_is_an_error() {
        let hasher = cheap("", 256, 1);
        assert!(hasher.verify("Secret1!", "garbage").is_err());
    }
}
