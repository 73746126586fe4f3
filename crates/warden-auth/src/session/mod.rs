//! Device and session records kept in the key-value store.

pub mod registry;

pub use registry::DeviceSessionRegistry;
