//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered user in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Email address, unique and case-sensitive as stored.
    pub email: String,
    /// Human-readable full name.
    pub full_name: String,
    /// Free-form profile text.
    pub bio: String,
    /// Encoded password digest (argon2id PHC string or bcrypt).
    #[serde(skip_serializing)]
    pub password_digest: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address.
    pub email: String,
    /// Full name.
    pub full_name: String,
    /// Profile text.
    pub bio: String,
    /// Already-hashed password digest.
    pub password_digest: String,
}
