//! Core traits defined in `warden-core` and implemented by other crates.

pub mod hasher;
pub mod store;

pub use hasher::CredentialHasher;
pub use store::{KvStore, StoreOp, WriteBatch};
