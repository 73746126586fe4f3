//! # warden-service
//!
//! Application-level authentication use cases for Warden. [`AuthService`]
//! composes the user directory, credential hashers, the device/session
//! registry and the rotation engine into register, login, refresh and
//! logout operations.
//!
//! Services follow constructor injection: all dependencies are provided at
//! construction time via `Arc` references.

pub mod auth;

pub use auth::AuthService;
