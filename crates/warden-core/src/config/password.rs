//! Credential hashing configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Algorithm used to hash newly stored passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    /// Argon2id (PHC string format).
    #[default]
    Argon2id,
    /// bcrypt (`$2b$` modular crypt format).
    Bcrypt,
}

impl std::fmt::Display for PasswordAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordAlgorithm::Argon2id => write!(f, "argon2id"),
            PasswordAlgorithm::Bcrypt => write!(f, "bcrypt"),
        }
    }
}

/// Password hashing and policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Algorithm used for new hashes.
    #[serde(default)]
    pub algorithm: PasswordAlgorithm,
    /// Optional application-wide secret mixed into every hash.
    #[serde(default)]
    pub pepper: String,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Argon2 iteration count.
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Argon2 parallelism.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Argon2 output length in bytes.
    #[serde(default = "default_key_len")]
    pub key_len: usize,
    /// bcrypt work factor.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Minimum accepted password length.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Maximum accepted password length.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            algorithm: PasswordAlgorithm::default(),
            pepper: String::new(),
            memory_kib: default_memory_kib(),
            time_cost: default_time_cost(),
            threads: default_threads(),
            key_len: default_key_len(),
            bcrypt_cost: default_bcrypt_cost(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl PasswordConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(AppError::configuration(format!(
                "Invalid password length bounds: {}..={}",
                self.min_length, self.max_length
            )));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(AppError::configuration(format!(
                "bcrypt cost must be within 4..=31, got {}",
                self.bcrypt_cost
            )));
        }
        Ok(())
    }
}

fn default_memory_kib() -> u32 {
    64 * 1024
}

fn default_time_cost() -> u32 {
    3
}

fn default_threads() -> u32 {
    1
}

fn default_key_len() -> usize {
    32
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_min_length() -> usize {
    8
}

fn default_max_length() -> usize {
    64
}
