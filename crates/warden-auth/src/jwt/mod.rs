//! Access and refresh token signing and parsing.
//!
//! Both token classes are HS256 JWTs, each signed with its own secret so a
//! leaked access secret cannot forge refresh tokens.

pub mod claims;
pub mod decoder;
pub mod encoder;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use decoder::JwtDecoder;
pub use encoder::JwtEncoder;

use uuid::Uuid;

use warden_core::config::AuthConfig;
use warden_core::result::AppResult;
use warden_entity::user::User;

use crate::error::AuthResult;

/// Signs and parses both token classes.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    encoder: JwtEncoder,
    decoder: JwtDecoder,
}

impl TokenCodec {
    /// Build the codec from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoder: JwtEncoder::new(config),
            decoder: JwtDecoder::new(config),
        }
    }

    /// Sign an access token bound to a session. Returns the token and its
    /// expiry in unix seconds.
    pub fn sign_access(
        &self,
        user: &User,
        session_id: &str,
        device_id: &str,
        jti: &str,
    ) -> AppResult<(String, i64)> {
        self.encoder.sign_access(user, session_id, device_id, jti)
    }

    /// Sign a refresh token for a family. Returns the token and its expiry
    /// in unix seconds.
    pub fn sign_refresh(
        &self,
        user_id: Uuid,
        jti: &str,
        device_id: &str,
        family_id: &str,
        user_version: i64,
    ) -> AppResult<(String, i64)> {
        self.encoder
            .sign_refresh(user_id, jti, device_id, family_id, user_version)
    }

    /// Verify and decode a refresh token.
    pub fn parse_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.decoder.parse_refresh(token)
    }

    /// Verify and decode an access token.
    pub fn parse_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.decoder.parse_access(token)
    }
}
