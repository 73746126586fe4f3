//! # warden-auth
//!
//! Token issuance, refresh-token rotation and revocation for Warden.
//!
//! ## Modules
//!
//! - `jwt`: signing and parsing of access and refresh tokens
//! - `password`: argon2id/bcrypt credential hashing and password policy
//! - `session`: device and session records kept in the key-value store
//! - `rotation`: the refresh-token family state machine with reuse detection
//! - `error`: the closed authentication error taxonomy

pub mod error;
pub mod jwt;
pub mod password;
pub mod rotation;
pub mod session;

pub use error::{AuthError, AuthResult, ErrorClass};
pub use jwt::{AccessClaims, RefreshClaims, TokenCodec};
pub use password::{HasherSet, PasswordValidator};
pub use rotation::{IssuedTokens, RotationEngine};
pub use session::DeviceSessionRegistry;
