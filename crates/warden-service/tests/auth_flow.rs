//! End-to-end authentication flows against the in-memory store and directory.

mod helpers;

use std::sync::Arc;

use warden_auth::error::AuthError;
use warden_auth::password::HasherSet;
use warden_core::config::PasswordAlgorithm;
use warden_core::traits::{CredentialHasher, KvStore};
use warden_database::UserDirectory;
use warden_entity::auth::{LogoutDeviceRequest, RefreshRequest, RegisterCommand};
use warden_entity::user::CreateUser;
use warden_store::keys;

use helpers::{PASSWORD, TestApp, login_command, password_config};

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = TestApp::new();
    let id = app.register("alice@x.com").await;
    assert!(app.users.get_user_by_id(id).await.unwrap().is_some());

    let err = app
        .auth
        .register(RegisterCommand {
            full_name: "Alice Again".into(),
            bio: String::new(),
            email: "alice@x.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailAlready));
    assert_eq!(err.code(), "EMAIL_ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_register_enforces_password_policy() {
    let app = TestApp::new();
    let err = app
        .auth
        .register(RegisterCommand {
            full_name: "Bob".into(),
            bio: String::new(),
            email: "bob@x.com".into(),
            password: "password".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    assert!(
        app.users
            .get_user_by_email("bob@x.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_refresh_token_is_single_use_and_reuse_blocks_family() {
    let app = TestApp::new();
    app.register("alice@x.com").await;
    let first = app.login("alice@x.com", "D1").await;

    let second = app
        .auth
        .refresh(RefreshRequest::new(first.refresh_token.clone()))
        .await
        .unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    let replay = app
        .auth
        .refresh(RefreshRequest::new(first.refresh_token.clone()))
        .await
        .unwrap_err();
    assert!(matches!(replay, AuthError::RefreshRevoked));
    assert!(replay.requires_reauthentication());

    let poisoned = app
        .auth
        .refresh(RefreshRequest::new(second.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(poisoned, AuthError::FamilyBlocked));
}

#[tokio::test]
async fn test_bad_credentials_are_indistinguishable() {
    let app = TestApp::new();
    app.register("alice@x.com").await;

    let wrong_password = app
        .auth
        .login(login_command("alice@x.com", "Wrong1!!", Some("D1")))
        .await
        .unwrap_err();
    let unknown_email = app
        .auth
        .login(login_command("nobody@x.com", PASSWORD, Some("D1")))
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(wrong_password.status_code(), unknown_email.status_code());
}

#[tokio::test]
async fn test_logout_device_blocks_family_and_drops_sessions() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;
    let d1 = app.login("alice@x.com", "D1").await;
    let d2 = app.login("alice@x.com", "D2").await;
    let d1_sid = app.access_claims(&d1).sid;

    app.auth
        .logout_device(LogoutDeviceRequest {
            user_id,
            device_id: "D1".into(),
        })
        .await
        .unwrap();

    assert!(app.auth.registry().get_session(&d1_sid).await.unwrap().is_none());
    let sessions = app.auth.registry().list_sessions(user_id).await.unwrap();
    assert!(sessions.iter().all(|s| s.device_id == "D2"));

    let err = app
        .auth
        .refresh(RefreshRequest::new(d1.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::FamilyBlocked));

    app.auth
        .refresh(RefreshRequest::new(d2.refresh_token))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_succeeds_exactly_once() {
    let app = Arc::new(TestApp::new());
    app.register("alice@x.com").await;

    for round in 0..10 {
        let device = format!("D{round}");
        let pair = app.login("alice@x.com", &device).await;

        let spawn_refresh = |token: String| {
            let app = app.clone();
            tokio::spawn(async move { app.auth.refresh(RefreshRequest::new(token)).await })
        };
        let a = spawn_refresh(pair.refresh_token.clone());
        let b = spawn_refresh(pair.refresh_token.clone());
        let results = [a.await.unwrap(), b.await.unwrap()];

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "round {round}: {results:?}");
        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e, AuthError::RotationRace | AuthError::RefreshRevoked),
                    "round {round}: unexpected {e:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_rotation_race_leaves_no_side_effects() {
    let app = TestApp::new();
    app.register("alice@x.com").await;
    let pair = app.login("alice@x.com", "D1").await;
    let claims = app.refresh_claims(&pair);
    let family = claims.fam.clone().unwrap();

    app.store
        .set_nx(
            &keys::rotation_lock(&family),
            "held-elsewhere",
            Some(std::time::Duration::from_secs(10)),
        )
        .await
        .unwrap();
    let err = app
        .auth
        .refresh(RefreshRequest::new(pair.refresh_token.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RotationRace));
    assert!(err.is_retryable());

    app.store
        .delete_if_eq(&keys::rotation_lock(&family), "held-elsewhere")
        .await
        .unwrap();
    app.auth
        .refresh(RefreshRequest::new(pair.refresh_token))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_logout_all_invalidates_outstanding_refresh_tokens() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;
    let d1 = app.login("alice@x.com", "D1").await;
    let d2 = app.login("alice@x.com", "D2").await;
    assert_eq!(app.refresh_claims(&d1).uv, Some(1));

    app.auth.logout_all(user_id).await.unwrap();
    assert!(app.auth.registry().list_sessions(user_id).await.unwrap().is_empty());

    for pair in [d1, d2] {
        let err = app
            .auth
            .refresh(RefreshRequest::new(pair.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken), "{err:?}");
    }

    let fresh = app.login("alice@x.com", "D1").await;
    assert_eq!(app.refresh_claims(&fresh).uv, Some(2));
    app.auth
        .refresh(RefreshRequest::new(fresh.refresh_token))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_repeat_login_reuses_device_record() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;

    app.login("alice@x.com", "D1").await;
    let first = app
        .auth
        .registry()
        .get_device(user_id, "D1")
        .await
        .unwrap()
        .unwrap();
    app.login("alice@x.com", "D1").await;

    let devices = app.auth.registry().list_devices(user_id).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].first_seen, first.first_seen);
    assert!(devices[0].last_seen >= first.last_seen);
    assert_eq!(devices[0].user_agent.as_deref(), Some("warden-test/1.0"));
}

#[tokio::test]
async fn test_login_without_device_id_generates_one() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;
    let pair = app
        .auth
        .login(login_command("alice@x.com", PASSWORD, None))
        .await
        .unwrap();

    let claims = app.access_claims(&pair);
    assert!(claims.did.starts_with("DEV_"));
    assert!(
        app.auth
            .registry()
            .get_device(user_id, &claims.did)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_access_token_session_matches_persisted_session() {
    let app = TestApp::new();
    app.register("alice@x.com").await;
    let first = app.login("alice@x.com", "D1").await;
    let refreshed = app
        .auth
        .refresh(RefreshRequest {
            refresh_token: first.refresh_token,
            ip: Some("198.51.100.2".into()),
            user_agent: Some("warden-test/2.0".into()),
        })
        .await
        .unwrap();

    let claims = app.access_claims(&refreshed);
    let session = app
        .auth
        .registry()
        .get_session(&claims.sid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.device_id, "D1");
    assert_eq!(session.ip.as_deref(), Some("198.51.100.2"));
    assert_eq!(session.user_agent.as_deref(), Some("warden-test/2.0"));
    assert_eq!(session.expires_at.timestamp(), refreshed.expires_at);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::new();
    app.register("alice@x.com").await;
    let pair = app.login("alice@x.com", "D1").await;

    let err = app
        .auth
        .refresh(RefreshRequest::new(pair.access_token))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidToken | AuthError::WrongTokenType
    ));
}

#[tokio::test]
async fn test_login_upgrades_legacy_digest() {
    let app = TestApp::new();
    let legacy = HasherSet::from_config(&password_config(PasswordAlgorithm::Bcrypt)).unwrap();
    let user = app
        .users
        .create_user(&CreateUser {
            email: "legacy@x.com".into(),
            full_name: "Legacy".into(),
            bio: String::new(),
            password_digest: legacy.hash(PASSWORD).unwrap(),
        })
        .await
        .unwrap();
    assert!(user.password_digest.starts_with("$2"));

    app.login("legacy@x.com", "D1").await;

    let upgraded = app.users.get_user_by_id(user.id).await.unwrap().unwrap();
    assert!(upgraded.password_digest.starts_with("$argon2id$"));
    app.login("legacy@x.com", "D1").await;
}

#[tokio::test]
async fn test_issue_records_family_under_device() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;
    let pair = app.login("alice@x.com", "D1").await;
    let claims = app.refresh_claims(&pair);
    let family = claims.fam.unwrap();

    assert!(family.starts_with("FAM_"));
    assert_eq!(
        app.store
            .smembers(&keys::user_device_families(user_id, "D1"))
            .await
            .unwrap(),
        vec![family.clone()]
    );
    assert!(app.store.exists(&keys::refresh_active(&claims.jti)).await.unwrap());
}

#[tokio::test]
async fn test_login_normalizes_email_like_register() {
    let app = TestApp::new();
    let user_id = app.register("  alice@x.com ").await;
    assert!(
        app.users
            .get_user_by_email("alice@x.com")
            .await
            .unwrap()
            .is_some()
    );

    for email in ["alice@x.com", " alice@x.com  "] {
        let pair = app.login(email, "D1").await;
        assert_eq!(app.access_claims(&pair).sub, user_id);
    }
}
