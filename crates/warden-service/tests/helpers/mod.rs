//! Shared test helpers for the auth flow tests.

pub mod gated;

use std::sync::Arc;

use uuid::Uuid;

use warden_auth::jwt::{AccessClaims, RefreshClaims};
use warden_auth::password::{HasherSet, PasswordValidator};
use warden_auth::rotation::RotationEngine;
use warden_auth::session::DeviceSessionRegistry;
use warden_core::config::{AuthConfig, PasswordAlgorithm, PasswordConfig};
use warden_core::traits::KvStore;
use warden_database::MemoryUserDirectory;
use warden_entity::auth::{LoginCommand, RegisterCommand};
use warden_entity::session::TokenPair;
use warden_service::AuthService;
use warden_store::StoreManager;
use warden_store::memory::MemoryStoreProvider;

pub const PASSWORD: &str = "Secret1!";

/// Test application context.
pub struct TestApp {
    /// The service under test.
    pub auth: AuthService,
    /// Store shared by every component.
    pub store: Arc<StoreManager>,
    /// Directory backing the service.
    pub users: Arc<MemoryUserDirectory>,
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        access_secret: "test-access-secret".into(),
        refresh_secret: "test-refresh-secret".into(),
        issuer: "warden-test".into(),
        access_ttl_minutes: 15,
        refresh_ttl_hours: 24,
        rotation_lock_seconds: 10,
        leeway_seconds: 0,
    }
}

/// Cheap parameters so tests stay fast.
pub fn password_config(algorithm: PasswordAlgorithm) -> PasswordConfig {
    PasswordConfig {
        algorithm,
        memory_kib: 256,
        time_cost: 1,
        threads: 1,
        bcrypt_cost: 4,
        ..Default::default()
    }
}

impl TestApp {
    /// Build a service over the in-memory store and directory.
    pub fn new() -> Self {
        Self::with_password(password_config(PasswordAlgorithm::Argon2id))
    }

    pub fn with_password(password: PasswordConfig) -> Self {
        Self::build(Arc::new(MemoryStoreProvider::default()), password)
    }

    /// Build a service over a caller-supplied store provider.
    pub fn with_provider(provider: Arc<dyn KvStore>) -> Self {
        Self::build(provider, password_config(PasswordAlgorithm::Argon2id))
    }

    fn build(provider: Arc<dyn KvStore>, password: PasswordConfig) -> Self {
        let config = auth_config();
        let store = Arc::new(StoreManager::from_provider(provider));
        let users = Arc::new(MemoryUserDirectory::new());
        let hashers = Arc::new(HasherSet::from_config(&password).expect("hashers"));
        let validator = Arc::new(PasswordValidator::new(&password));
        let registry = DeviceSessionRegistry::new(store.clone(), config.refresh_ttl());
        let engine = Arc::new(RotationEngine::new(
            &config,
            store.clone(),
            users.clone(),
            registry.clone(),
        ));
        let auth = AuthService::new(users.clone(), hashers, validator, registry, engine);
        Self { auth, store, users }
    }

    /// Register a user with [`PASSWORD`].
    pub async fn register(&self, email: &str) -> Uuid {
        self.auth
            .register(RegisterCommand {
                full_name: "Test User".into(),
                bio: String::new(),
                email: email.into(),
                password: PASSWORD.into(),
            })
            .await
            .expect("register")
    }

    /// Log in from `device_id`.
    pub async fn login(&self, email: &str, device_id: &str) -> TokenPair {
        self.auth
            .login(login_command(email, PASSWORD, Some(device_id)))
            .await
            .expect("login")
    }

    pub fn access_claims(&self, pair: &TokenPair) -> AccessClaims {
        self.auth
            .engine()
            .codec()
            .parse_access(&pair.access_token)
            .expect("access claims")
    }

    pub fn refresh_claims(&self, pair: &TokenPair) -> RefreshClaims {
        self.auth
            .engine()
            .codec()
            .parse_refresh(&pair.refresh_token)
            .expect("refresh claims")
    }
}

pub fn login_command(email: &str, password: &str, device_id: Option<&str>) -> LoginCommand {
    LoginCommand {
        email: email.into(),
        password: password.into(),
        device_id: device_id.map(str::to_string),
        device_meta: Default::default(),
        ip: Some("203.0.113.7".into()),
        user_agent: Some("warden-test/1.0".into()),
    }
}
