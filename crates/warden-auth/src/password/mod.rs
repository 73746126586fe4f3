//! Credential hashing and password policy.

pub mod bcrypt;
pub mod factory;
pub mod hasher;
pub mod validator;

pub use self::bcrypt::BcryptHasher;
pub use factory::HasherSet;
pub use hasher::Argon2idHasher;
pub use validator::PasswordValidator;
