//! Token verification.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use tracing::debug;

use warden_core::config::AuthConfig;

use super::claims::{AccessClaims, RefreshClaims, TokenType};
use crate::error::{AuthError, AuthResult};

/// The only accepted signing algorithm.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Verifies signature, algorithm, issuer and expiry of both token classes.
#[derive(Clone)]
pub struct JwtDecoder {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            access_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a refresh token.
    pub fn parse_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        let claims: RefreshClaims = self.decode_with(token, &self.refresh_key)?;
        if claims.typ != TokenType::Refresh {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Decodes and validates an access token.
    pub fn parse_access(&self, token: &str) -> AuthResult<AccessClaims> {
        let claims: AccessClaims = self.decode_with(token, &self.access_key)?;
        if claims.typ != TokenType::Access {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }

    fn decode_with<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> AuthResult<T> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Rejected token with unreadable header");
            AuthError::InvalidToken
        })?;
        if header.alg != SIGNING_ALGORITHM {
            debug!(alg = ?header.alg, "Rejected token with unexpected signing method");
            return Err(AuthError::WrongAlgorithm);
        }

        let data = decode::<T>(token, key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => AuthError::WrongAlgorithm,
            _ => {
                debug!(error = %e, "Rejected token");
                AuthError::InvalidToken
            }
        })?;
        Ok(data.claims)
    }
}
