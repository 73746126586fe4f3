//! Register, login, refresh and logout.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use warden_auth::error::{AuthError, AuthResult, ErrorClass};
use warden_auth::password::{HasherSet, PasswordValidator};
use warden_auth::rotation::RotationEngine;
use warden_auth::session::DeviceSessionRegistry;
use warden_core::error::{AppError, ErrorKind};
use warden_core::traits::CredentialHasher;
use warden_database::UserDirectory;
use warden_entity::auth::{LoginCommand, LogoutDeviceRequest, RefreshRequest, RegisterCommand};
use warden_entity::device::Device;
use warden_entity::session::TokenPair;
use warden_entity::user::{CreateUser, User};

/// Orchestrates the authentication use cases.
#[derive(Debug, Clone)]
pub struct AuthService {
    /// User directory.
    users: Arc<dyn UserDirectory>,
    /// Credential hashers.
    hashers: Arc<HasherSet>,
    /// Password policy for new accounts.
    validator: Arc<PasswordValidator>,
    /// Device and session records.
    registry: DeviceSessionRegistry,
    /// Refresh-token state machine.
    engine: Arc<RotationEngine>,
}

/// Emails are stored and looked up without surrounding whitespace.
fn normalize_email(email: &str) -> &str {
    email.trim()
}

/// Log dependency failures once, at the boundary.
fn observe<T>(operation: &'static str, result: AuthResult<T>) -> AuthResult<T> {
    if let Err(e) = &result {
        match e.class() {
            ErrorClass::Dependency => error!(operation, error = %e, "Auth dependency failed"),
            ErrorClass::SecurityReactive => {
                warn!(operation, code = e.code(), "Refresh family rejected")
            }
            _ => debug!(operation, code = e.code(), "Auth request rejected"),
        }
    }
    result
}

impl AuthService {
    /// Creates a new auth service.
    pub fn new(
        users: Arc<dyn UserDirectory>,
        hashers: Arc<HasherSet>,
        validator: Arc<PasswordValidator>,
        registry: DeviceSessionRegistry,
        engine: Arc<RotationEngine>,
    ) -> Self {
        Self {
            users,
            hashers,
            validator,
            registry,
            engine,
        }
    }

    /// The device and session registry.
    pub fn registry(&self) -> &DeviceSessionRegistry {
        &self.registry
    }

    /// The rotation engine.
    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    /// Create an account. Returns the new user's id.
    pub async fn register(&self, cmd: RegisterCommand) -> AuthResult<Uuid> {
        observe("register", self.register_inner(cmd).await)
    }

    async fn register_inner(&self, cmd: RegisterCommand) -> AuthResult<Uuid> {
        let email = normalize_email(&cmd.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("Invalid email format".into()));
        }
        if cmd.full_name.trim().is_empty() {
            return Err(AuthError::Validation("Full name cannot be empty".into()));
        }
        self.validator
            .validate(&cmd.password)
            .map_err(|e| AuthError::Validation(e.message))?;

        if self.users.get_user_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlready);
        }

        let password_digest = self.hash_password(cmd.password).await?;
        let created = self
            .users
            .create_user(&CreateUser {
                email: email.to_string(),
                full_name: cmd.full_name.trim().to_string(),
                bio: cmd.bio,
                password_digest,
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(e) if e.kind == ErrorKind::Conflict => return Err(AuthError::EmailAlready),
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "User registered");
        Ok(user.id)
    }

    /// Verify credentials, resolve the device and open a refresh family.
    pub async fn login(&self, cmd: LoginCommand) -> AuthResult<TokenPair> {
        observe("login", self.login_inner(cmd).await)
    }

    async fn login_inner(&self, cmd: LoginCommand) -> AuthResult<TokenPair> {
        let Some(user) = self
            .users
            .get_user_by_email(normalize_email(&cmd.email))
            .await?
        else {
            let hashers = self.hashers.clone();
            let password = cmd.password;
            tokio::task::spawn_blocking(move || hashers.verify_dummy(&password))
                .await
                .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))?;
            return Err(AuthError::InvalidCredentials);
        };

        let (verified, rehash) = self.verify_password(&cmd.password, &user).await?;
        if !verified {
            return Err(AuthError::InvalidCredentials);
        }
        if rehash {
            self.upgrade_digest(&user, cmd.password.clone()).await;
        }

        let device_id = cmd
            .device_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("DEV_{}", Uuid::now_v7().simple()).to_uppercase());

        let device = match self.registry.get_device(user.id, &device_id).await? {
            Some(mut device) => {
                if !device.is_active() {
                    info!(
                        user_id = %user.id,
                        device_id = %device_id,
                        "Device signed in again after logout"
                    );
                }
                device.touch(cmd.user_agent.clone());
                device
            }
            None => {
                debug!(user_id = %user.id, device_id = %device_id, "New device");
                Device::first_seen(user.id, &device_id, &cmd.device_meta, cmd.user_agent.clone())
            }
        };
        self.registry.save_device(&device).await?;

        let issued = self
            .engine
            .issue(&user, &device_id, cmd.ip, cmd.user_agent)
            .await?;

        info!(user_id = %user.id, device_id = %device_id, "User logged in");
        Ok(issued.into())
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh(&self, request: RefreshRequest) -> AuthResult<TokenPair> {
        let result = self.engine.rotate(&request).await.map(TokenPair::from);
        observe("refresh", result)
    }

    /// Sign one device out: block its refresh families and drop its sessions.
    pub async fn logout_device(&self, request: LogoutDeviceRequest) -> AuthResult<()> {
        let result = self
            .engine
            .revoke_device(request.user_id, &request.device_id)
            .await
            .map(|_| ());
        observe("logout_device", result)
    }

    /// Invalidate every refresh token of a user and drop all sessions.
    pub async fn logout_all(&self, user_id: Uuid) -> AuthResult<()> {
        let result = self
            .registry
            .logout_all(user_id)
            .await
            .map(|_| ())
            .map_err(AuthError::from);
        observe("logout_all", result)
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let hashers = self.hashers.clone();
        let digest = tokio::task::spawn_blocking(move || hashers.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))??;
        Ok(digest)
    }

    /// Returns `(verified, rehash_needed)`.
    async fn verify_password(&self, password: &str, user: &User) -> AuthResult<(bool, bool)> {
        let hashers = self.hashers.clone();
        let password = password.to_string();
        let digest = user.password_digest.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let verified = hashers.verify(&password, &digest)?;
            Ok::<_, AppError>((verified, verified && hashers.rehash_needed(&digest)))
        })
        .await
        .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))??;
        Ok(outcome)
    }

    /// Best-effort digest upgrade after a successful login.
    async fn upgrade_digest(&self, user: &User, password: String) {
        let upgraded = match self.hash_password(password).await {
            Ok(digest) => self.users.update_password_digest(user.id, &digest).await,
            Err(e) => Err(AppError::internal(e.to_string())),
        };
        match upgraded {
            Ok(()) => info!(user_id = %user.id, "Password digest upgraded"),
            Err(e) => warn!(user_id = %user.id, error = %e, "Password digest upgrade failed"),
        }
    }
}
