//! Refresh-token rotation with family-based reuse detection.

pub mod engine;
pub mod lease;

pub use engine::{IssuedTokens, RotationEngine};
pub use lease::FamilyLease;
