//! Embedded schema migrations.

use sqlx::PgPool;
use tracing::info;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;

/// Apply every pending migration under `crates/warden-database/migrations`.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!("Applying user directory migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("Migration failed: {e}"), e)
    })?;

    info!("User directory schema is up to date");
    Ok(())
}
