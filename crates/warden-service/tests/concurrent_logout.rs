//! Logout racing a refresh that is already committing.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use warden_auth::error::AuthError;
use warden_core::traits::KvStore;
use warden_entity::auth::{LogoutDeviceRequest, RefreshRequest};
use warden_store::keys;

use helpers::TestApp;
use helpers::gated::GatedStore;

fn gated_app() -> (Arc<TestApp>, Arc<GatedStore>) {
    let gate = Arc::new(GatedStore::default());
    let app = Arc::new(TestApp::with_provider(gate.clone()));
    (app, gate)
}

#[tokio::test(start_paused = true)]
async fn test_logout_device_waits_for_in_flight_refresh() {
    let (app, gate) = gated_app();
    let user_id = app.register("alice@x.com").await;
    let pair = app.login("alice@x.com", "D1").await;
    let family = app.refresh_claims(&pair).fam.unwrap();

    gate.arm();
    let refresh = tokio::spawn({
        let app = app.clone();
        async move { app.auth.refresh(RefreshRequest::new(pair.refresh_token)).await }
    });
    gate.reached().await;

    let logout = tokio::spawn({
        let app = app.clone();
        async move {
            app.auth
                .logout_device(LogoutDeviceRequest {
                    user_id,
                    device_id: "D1".into(),
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!logout.is_finished());
    assert!(!app.store.exists(&keys::family_blocked(&family)).await.unwrap());

    gate.release();
    let refreshed = refresh.await.unwrap().unwrap();
    logout.await.unwrap().unwrap();

    let sid = app.access_claims(&refreshed).sid;
    assert!(app.auth.registry().get_session(&sid).await.unwrap().is_none());
    assert!(app.auth.registry().list_sessions(user_id).await.unwrap().is_empty());

    let err = app
        .auth
        .refresh(RefreshRequest::new(refreshed.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::FamilyBlocked), "{err:?}");
}

#[tokio::test]
async fn test_logout_all_during_refresh_commit_retracts_rotation() {
    let (app, gate) = gated_app();
    let user_id = app.register("alice@x.com").await;
    let pair = app.login("alice@x.com", "D1").await;

    gate.arm();
    let refresh = tokio::spawn({
        let app = app.clone();
        async move { app.auth.refresh(RefreshRequest::new(pair.refresh_token)).await }
    });
    gate.reached().await;

    app.auth.logout_all(user_id).await.unwrap();
    gate.release();

    let err = refresh.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken), "{err:?}");
    assert!(app.auth.registry().list_sessions(user_id).await.unwrap().is_empty());
    assert!(
        app.store
            .smembers(&keys::user_sessions(user_id))
            .await
            .unwrap()
            .is_empty()
    );

    let fresh = app.login("alice@x.com", "D1").await;
    app.auth
        .refresh(RefreshRequest::new(fresh.refresh_token))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_after_logout_device_reactivates_device() {
    let app = TestApp::new();
    let user_id = app.register("alice@x.com").await;
    app.login("alice@x.com", "D1").await;

    app.auth
        .logout_device(LogoutDeviceRequest {
            user_id,
            device_id: "D1".into(),
        })
        .await
        .unwrap();
    let device = app
        .auth
        .registry()
        .get_device(user_id, "D1")
        .await
        .unwrap()
        .unwrap();
    assert!(!device.is_active());

    app.login("alice@x.com", "D1").await;
    let device = app
        .auth
        .registry()
        .get_device(user_id, "D1")
        .await
        .unwrap()
        .unwrap();
    assert!(device.is_active());
}
