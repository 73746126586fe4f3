//! Session domain entities.

pub mod model;
pub mod status;
pub mod token;

pub use model::Session;
pub use status::SessionStatus;
pub use token::TokenPair;
