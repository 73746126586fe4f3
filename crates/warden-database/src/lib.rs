//! # warden-database
//!
//! The user directory consumed by the authentication core: a
//! [`UserDirectory`] contract, a PostgreSQL implementation on top of
//! sqlx and an in-memory one for tests and single-process deployments.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{MemoryUserDirectory, PgUserRepository, UserDirectory};
