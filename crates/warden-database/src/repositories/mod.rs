//! User directory contract and its implementations.

pub mod memory;
pub mod user;

use async_trait::async_trait;
use uuid::Uuid;

use warden_core::result::AppResult;
use warden_entity::user::{CreateUser, User};

pub use memory::MemoryUserDirectory;
pub use user::PgUserRepository;

/// Durable user records keyed by id and email.
///
/// Lookups return `Ok(None)` for unknown users; `Err` is reserved for the
/// directory being unreachable or failing.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user by exact email.
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Find a user by primary key.
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Insert a new user. A duplicate email yields a `Conflict` error.
    async fn create_user(&self, data: &CreateUser) -> AppResult<User>;

    /// Replace the stored password digest.
    async fn update_password_digest(&self, id: Uuid, digest: &str) -> AppResult<()>;
}
