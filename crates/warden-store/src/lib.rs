//! # warden-store
//!
//! Key-value store providers for Warden. Supports two modes:
//!
//! - **memory**: In-process store with per-entry deadlines, for tests and
//!   single-process deployments
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis) crate,
//!   for multi-process deployments
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::StoreManager;
