//! PostgreSQL user repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_entity::user::{CreateUser, User};

use super::UserDirectory;

/// Name of the unique constraint on `users.email`.
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// User directory backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserRepository {
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find user by email", e)
            })
    }

    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user by id", e))
    }

    async fn create_user(&self, data: &CreateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, full_name, bio, password_digest) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(&data.bio)
        .bind(&data.password_digest)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(EMAIL_CONSTRAINT) => {
                AppError::conflict("Email already in use")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create user", e),
        })
    }

    async fn update_password_digest(&self, id: Uuid, digest: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_digest = $2 WHERE id = $1")
            .bind(id)
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update password digest", e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {id} not found")));
        }
        Ok(())
    }
}
