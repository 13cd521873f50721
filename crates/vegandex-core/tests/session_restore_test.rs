//! Sign in, drop everything, start again: the session comes back from the
//! file credential store the way the CLI opens it.

use std::sync::Arc;

use serde_json::json;
use vegandex_core::{
    open_credential_store, ApiClient, Config, CredentialBackend, CredentialStore, SessionManager,
    SessionStatus,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Manager = SessionManager<ApiClient, dyn CredentialStore>;

fn file_config(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    Config {
        api_base_url: Some(format!("{}/api", server.uri())),
        credential_backend: CredentialBackend::File,
        cache_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    }
}

/// What a fresh process would build from `config`.
async fn start(config: &Config) -> Manager {
    let api = Arc::new(ApiClient::from_config(config).unwrap());
    let store = open_credential_store(config).unwrap();
    let manager = SessionManager::new(api, store);
    manager.initialize().await;
    manager
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t1"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "1",
            "email": "a@b.com",
            "username": "alice",
            "uploadedProducts": ["p1"]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_session_survives_restart_with_file_store() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&server, &dir);

    {
        let manager = start(&config).await;
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        manager.login("a@b.com", "pw").await.unwrap();
        manager.record_uploaded_product("p2").await;
    }
    assert!(dir.path().join("credentials.json").exists());

    let restarted = start(&config).await;
    assert_eq!(restarted.status(), SessionStatus::Authenticated);
    assert_eq!(restarted.token().as_deref(), Some("t1"));
    // The server copy replaces the local snapshot on restart
    let profile = restarted.profile().unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.uploaded_products, vec!["p1"]);
}

#[tokio::test]
async fn test_logout_is_remembered_across_restart() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&server, &dir);

    start(&config).await.login("a@b.com", "pw").await.unwrap();
    start(&config).await.logout().await;
    assert!(!dir.path().join("credentials.json").exists());

    let restarted = start(&config).await;
    assert_eq!(restarted.status(), SessionStatus::Unauthenticated);
    assert!(restarted.profile().is_none());
}

#[tokio::test]
async fn test_half_written_file_store_is_discarded_on_restart() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&server, &dir);
    std::fs::write(dir.path().join("credentials.json"), r#"{"token": "t1"}"#).unwrap();

    let restarted = start(&config).await;

    assert_eq!(restarted.status(), SessionStatus::Unauthenticated);
    assert!(!dir.path().join("credentials.json").exists());
    assert!(server.received_requests().await.unwrap().is_empty());
}
