//! Token signing.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use uuid::Uuid;

use warden_core::config::AuthConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_entity::user::User;

use super::claims::{AccessClaims, RefreshClaims, TokenType};

/// Creates HS256-signed access and refresh tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl_seconds: config.access_ttl().as_secs() as i64,
            refresh_ttl_seconds: config.refresh_ttl().as_secs() as i64,
        }
    }

    /// Sign an access token.
    pub fn sign_access(
        &self,
        user: &User,
        session_id: &str,
        device_id: &str,
        jti: &str,
    ) -> AppResult<(String, i64)> {
        let now = Utc::now().timestamp();
        let exp = now + self.access_ttl_seconds;

        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            typ: TokenType::Access,
            sid: session_id.to_string(),
            did: device_id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: jti.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_key)
            .map_err(|e| AppError::internal(format!("Failed to encode access token: {e}")))?;
        Ok((token, exp))
    }

    /// Sign a refresh token.
    pub fn sign_refresh(
        &self,
        user_id: Uuid,
        jti: &str,
        device_id: &str,
        family_id: &str,
        user_version: i64,
    ) -> AppResult<(String, i64)> {
        let now = Utc::now().timestamp();
        let exp = now + self.refresh_ttl_seconds;

        let claims = RefreshClaims {
            sub: user_id,
            typ: TokenType::Refresh,
            did: device_id.to_string(),
            fam: Some(family_id.to_string()),
            uv: Some(user_version),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: jti.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_key)
            .map_err(|e| AppError::internal(format!("Failed to encode refresh token: {e}")))?;
        Ok((token, exp))
    }
}
