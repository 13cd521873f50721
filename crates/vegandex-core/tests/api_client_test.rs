//! HTTP-level tests for `ApiClient` against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vegandex_core::auth::{CredentialStore, MemoryCredentialStore, TOKEN_KEY, USER_KEY};
use vegandex_core::{ApiClient, ApiError, AuthService, ProfileUpdate, SessionError, SessionManager, SessionStatus};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(2)).unwrap()
}

fn profile_json() -> serde_json::Value {
    json!({
        "_id": "1",
        "email": "a@b.com",
        "username": "alice",
        "uploadedProducts": []
    })
}

#[tokio::test]
async fn test_login_posts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "t1",
            "_id": "1",
            "email": "a@b.com",
            "username": "alice"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).login("a@b.com", "pw").await.unwrap();
    assert_eq!(response.token(), Some("t1"));
}

#[tokio::test]
async fn test_register_posts_username() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({"email": "a@b.com", "password": "pw", "username": "alice"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "t1",
            "user": {"_id": "1", "email": "a@b.com", "username": "alice"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .register("alice", "a@b.com", "pw")
        .await
        .unwrap();
    assert_eq!(response.token(), Some("t1"));
}

#[tokio::test]
async fn test_fetch_profile_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "1",
            "email": "a@b.com",
            "username": "alice"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client_for(&server).fetch_profile("t1").await.unwrap();
    assert_eq!(profile.username, "alice");
    assert!(profile.uploaded_products.is_empty());
}

#[tokio::test]
async fn test_unauthorized_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_profile("old").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.server_message(), Some("Token expired"));
}

#[tokio::test]
async fn test_malformed_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile_json())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client =
        ApiClient::new(&format!("{}/api", server.uri()), Duration::from_millis(200)).unwrap();
    let err = client.fetch_profile("t1").await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ApiClient::new(
        &format!("http://127.0.0.1:{port}/api"),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = client.login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_update_profile_puts_changes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer t1"))
        .and(body_json(json!({"username": "alicia"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "1",
            "email": "a@b.com",
            "username": "alicia",
            "uploadedProducts": ["p1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let update = ProfileUpdate {
        username: Some("alicia".to_string()),
        email: None,
    };
    let profile = client_for(&server).update_profile("t1", &update).await.unwrap();
    assert_eq!(profile.username, "alicia");
    assert_eq!(profile.uploaded_products, vec!["p1"]);
}

#[tokio::test]
async fn test_verification_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/verify-email"))
        .and(query_param("token", "v123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Email verified"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/resend-verification"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.verify_email("v123").await.unwrap();
    client.resend_verification("t1").await.unwrap();
}

// ============================================================================
// Session manager over HTTP
// ============================================================================

#[tokio::test]
async fn test_session_login_and_logout_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "t1",
            "_id": "1",
            "email": "a@b.com",
            "username": "alice"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .mount(&server)
        .await;
    // Logout blows up server-side; the local session must still end
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = SessionManager::new(Arc::new(client_for(&server)), store.clone());
    manager.initialize().await;
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);

    let profile = manager.login("a@b.com", "pw").await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(manager.status(), SessionStatus::Authenticated);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("t1"));

    manager.logout().await;
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(USER_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_session_restart_with_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(TOKEN_KEY, "expired").await.unwrap();
    store
        .set(USER_KEY, &profile_json().to_string())
        .await
        .unwrap();

    let manager = SessionManager::new(Arc::new(client_for(&server)), store.clone());
    manager.initialize().await;

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_session_login_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "1"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = SessionManager::new(Arc::new(client_for(&server)), store.clone());
    manager.initialize().await;

    let err = manager.login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert!(store.is_empty());
    // No profile request was ever made
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}
