//! Authentication error taxonomy.
//!
//! Every failure the rotation engine and the auth service can report is a
//! variant of [`AuthError`]. Store and directory failures travel inside
//! [`AuthError::Dependency`] untouched so their cause chain is preserved.

use thiserror::Error;

use warden_core::error::{AppError, ErrorKind};

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// How a caller should react to an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad request or bad credentials. Report, never retry.
    ClientInput,
    /// The presented token is unusable. Re-authenticate.
    TokenValidity,
    /// Replay or poisoned family. Re-authenticate and surface to monitoring.
    SecurityReactive,
    /// Lock contention on a family. Retry with backoff.
    Contention,
    /// Store or directory failure. Internal error.
    Dependency,
}

/// Closed set of authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed, badly signed, expired or superseded token.
    #[error("invalid token")]
    InvalidToken,
    /// The token's type claim does not match the expected class.
    #[error("wrong token type")]
    WrongTokenType,
    /// The token header names a signing algorithm other than HS256.
    #[error("unexpected signing method")]
    WrongAlgorithm,
    /// The refresh token is expired or was never registered.
    #[error("refresh token is not active")]
    RefreshNotActive,
    /// The refresh token was already rotated; its family is now blocked.
    #[error("refresh token was already used")]
    RefreshRevoked,
    /// The token's family has been blocked.
    #[error("refresh token family is blocked")]
    FamilyBlocked,
    /// Another rotation holds the family lease.
    #[error("concurrent refresh in progress")]
    RotationRace,
    /// The token's subject no longer exists.
    #[error("user not found")]
    UserNotFound,
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The email is already registered.
    #[error("email already registered")]
    EmailAlready,
    /// Input rejected by policy.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The store or the user directory failed.
    #[error(transparent)]
    Dependency(#[from] AppError),
}

impl AuthError {
    /// The reaction class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCredentials | Self::EmailAlready | Self::Validation(_) => {
                ErrorClass::ClientInput
            }
            Self::InvalidToken
            | Self::WrongTokenType
            | Self::WrongAlgorithm
            | Self::RefreshNotActive
            | Self::UserNotFound => ErrorClass::TokenValidity,
            Self::RefreshRevoked | Self::FamilyBlocked => ErrorClass::SecurityReactive,
            Self::RotationRace => ErrorClass::Contention,
            Self::Dependency(_) => ErrorClass::Dependency,
        }
    }

    /// Whether a well-behaved client may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RotationRace)
    }

    /// Whether the client must log in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::TokenValidity | ErrorClass::SecurityReactive
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::WrongTokenType => "WRONG_TOKEN_TYPE",
            Self::WrongAlgorithm => "UNEXPECTED_SIGNING_METHOD",
            Self::RefreshNotActive => "REFRESH_NOT_ACTIVE",
            Self::RefreshRevoked => "REFRESH_REVOKED",
            Self::FamilyBlocked => "FAMILY_BLOCKED",
            Self::RotationRace => "ROTATION_RACE",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailAlready => "EMAIL_ALREADY_REGISTERED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Dependency(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-style status for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InvalidToken
            | Self::WrongTokenType
            | Self::WrongAlgorithm
            | Self::RefreshNotActive
            | Self::RefreshRevoked
            | Self::FamilyBlocked
            | Self::InvalidCredentials => 401,
            Self::UserNotFound => 404,
            Self::EmailAlready => 409,
            Self::RotationRace => 429,
            Self::Dependency(_) => 500,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let kind = match err {
            AuthError::Dependency(inner) => return inner,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::EmailAlready | AuthError::RotationRace => ErrorKind::Conflict,
            AuthError::UserNotFound => ErrorKind::NotFound,
            _ => ErrorKind::Authentication,
        };
        AppError::new(kind, format!("{}: {err}", err.code()))
    }
}
