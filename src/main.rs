//! Warden Server: refresh-token rotation and revocation core.
//!
//! Main entry point that wires all crates together and keeps the process
//! alive until a shutdown signal arrives.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use warden_auth::password::{HasherSet, PasswordValidator};
use warden_auth::rotation::RotationEngine;
use warden_auth::session::DeviceSessionRegistry;
use warden_core::config::AppConfig;
use warden_core::error::AppError;
use warden_core::traits::KvStore;
use warden_database::{DatabasePool, MemoryUserDirectory, PgUserRepository, UserDirectory};
use warden_service::AuthService;
use warden_store::StoreManager;

#[tokio::main]
async fn main() {
    let env = std::env::var("WARDEN_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Key-value store ──────────────────────────────────
    tracing::info!(provider = %config.store.provider, "Initializing session store...");
    let store = Arc::new(StoreManager::new(&config.store).await?);
    if !store.health_check().await? {
        return Err(AppError::service_unavailable(
            "Session store failed its health check",
        ));
    }
    tracing::info!("Session store ready");

    // ── Step 2: User directory ───────────────────────────────────
    let (users, db_pool) = build_directory(&config).await?;

    // ── Step 3: Credential hashing ───────────────────────────────
    let hashers = Arc::new(HasherSet::from_config(&config.password)?);
    let validator = Arc::new(PasswordValidator::new(&config.password));
    tracing::info!(algorithm = %config.password.algorithm, "Credential hashers ready");

    // ── Step 4: Registry, rotation engine, auth service ──────────
    let registry = DeviceSessionRegistry::new(store.clone(), config.auth.refresh_ttl());
    let engine = Arc::new(RotationEngine::new(
        &config.auth,
        store.clone(),
        users.clone(),
        registry.clone(),
    ));
    let auth = AuthService::new(users, hashers, validator, registry, engine);

    tracing::info!(
        issuer = %config.auth.issuer,
        access_ttl_minutes = config.auth.access_ttl_minutes,
        refresh_ttl_hours = config.auth.refresh_ttl_hours,
        "Warden auth core ready"
    );

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await?;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    drop(auth);
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("Warden shut down gracefully");
    Ok(())
}

/// Select the user directory named by `database.provider`.
async fn build_directory(
    config: &AppConfig,
) -> Result<(Arc<dyn UserDirectory>, Option<DatabasePool>), AppError> {
    match config.database.provider.as_str() {
        "postgres" => {
            tracing::info!("Connecting to database...");
            let pool = DatabasePool::connect(&config.database).await?;

            tracing::info!("Running database migrations...");
            warden_database::migration::run_migrations(pool.pool()).await?;
            tracing::info!("Database migrations complete");

            let users: Arc<dyn UserDirectory> = Arc::new(PgUserRepository::new(pool.pool().clone()));
            Ok((users, Some(pool)))
        }
        "memory" => {
            tracing::warn!("Using in-memory user directory; accounts are lost on restart");
            Ok((Arc::new(MemoryUserDirectory::new()), None))
        }
        other => Err(AppError::configuration(format!(
            "Unknown database provider: {other}"
        ))),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() -> Result<(), AppError> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::internal(format!("Failed to install Ctrl+C handler: {e}")))
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).map_err(
                |e| AppError::internal(format!("Failed to install SIGTERM handler: {e}")),
            )?;
        signal.recv().await;
        Ok::<(), AppError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), AppError>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
