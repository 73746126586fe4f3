//! In-process user directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_entity::user::{CreateUser, User};

use super::UserDirectory;

#[derive(Debug, Default)]
struct Users {
    by_id: HashMap<Uuid, User>,
    id_by_email: HashMap<String, Uuid>,
}

/// User directory held in memory. Emails are unique and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<Users>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user, as an operator deleting an account would.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        let mut users = self.users.write().await;
        match users.by_id.remove(&id) {
            Some(user) => {
                users.id_by_email.remove(&user.email);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .id_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }

    async fn create_user(&self, data: &CreateUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.id_by_email.contains_key(&data.email) {
            return Err(AppError::conflict("Email already in use"));
        }

        let user = User {
            id: Uuid::now_v7(),
            email: data.email.clone(),
            full_name: data.full_name.clone(),
            bio: data.bio.clone(),
            password_digest: data.password_digest.clone(),
            created_at: Utc::now(),
        };
        users.id_by_email.insert(user.email.clone(), user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_digest(&self, id: Uuid, digest: &str) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .by_id
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.password_digest = digest.to_string();
        Ok(())
    }
}
