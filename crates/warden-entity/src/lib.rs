//! # warden-entity
//!
//! Domain entity models for Warden. Users are rows in the relational
//! directory and derive `sqlx::FromRow`; devices and sessions are JSON
//! documents held in the key-value store with a TTL. Inbound commands and
//! the issued token pair live in [`auth`].

pub mod auth;
pub mod device;
pub mod session;
pub mod user;
