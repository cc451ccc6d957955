//! Request pipeline against a mock service: bearer attachment on the way
//! out, 401 handling on the way back.

mod common;

use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use authkeep_core::{ApiClient, ApiError, Config, MemoryNavigator, MemoryTokenStore};
use common::{Fixture, SETTLE};

#[tokio::test]
async fn test_every_request_carries_the_persisted_token() {
    let fx = Fixture::start(Some("tok1"), "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/images"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tags"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
        .expect(1)
        .mount(&fx.server)
        .await;

    let api = fx.api();
    let images: Vec<Value> = api.get_json("/api/v1/images").await.expect("GET should succeed");
    assert!(images.is_empty());

    let created: Value = api
        .post_json("/api/v1/tags", &json!({"name": "sunset"}))
        .await
        .expect("POST should succeed");
    assert_eq!(created["id"], 3);
}

#[tokio::test]
async fn test_no_authorization_header_without_token() {
    let fx = Fixture::start(None, "/").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let _: Vec<Value> = fx.api().get_json("/api/v1/categories").await.unwrap();

    let requests = fx.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_token_change_is_picked_up_by_next_request() {
    use authkeep_core::TokenStore;

    let fx = Fixture::start(Some("old"), "/").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::user_json(1, "alice", "user")))
        .expect(1)
        .mount(&fx.server)
        .await;

    let api = fx.api();
    fx.tokens.save("new").unwrap();
    let response = api
        .execute(api.request(Method::GET, "/api/v1/users/me"))
        .await
        .expect("Request with the new token should succeed");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_expired_session_clears_token_and_redirects() {
    let fx = Fixture::start(Some("tok1"), "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/images"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .mount(&fx.server)
        .await;

    let err = fx
        .api()
        .get_json::<Vec<Value>>("/api/v1/images")
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(fx.persisted(), None);
    // Redirect is deferred
    assert!(fx.navigator.history().is_empty());

    tokio::time::sleep(SETTLE).await;
    assert_eq!(fx.navigator.history(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_unauthorized_on_login_page_does_not_redirect() {
    let fx = Fixture::start(Some("tok1"), "/login").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fx.server)
        .await;

    let err = fx.api().get_json::<Value>("/api/v1/users/me").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(fx.persisted(), None);

    tokio::time::sleep(SETTLE).await;
    assert!(fx.navigator.history().is_empty());
}

#[tokio::test]
async fn test_unauthorized_on_register_page_does_not_redirect() {
    let fx = Fixture::start(Some("tok1"), "/register").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/images"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fx.server)
        .await;

    let _ = fx.api().get_json::<Value>("/api/v1/images").await;

    tokio::time::sleep(SETTLE).await;
    assert_eq!(fx.persisted(), None);
    assert!(fx.navigator.history().is_empty());
}

#[tokio::test]
async fn test_unauthorized_without_token_is_passed_through() {
    let fx = Fixture::start(None, "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fx.server)
        .await;

    let err = fx.api().get_json::<Value>("/api/v1/users/me").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    tokio::time::sleep(SETTLE).await;
    assert!(fx.navigator.history().is_empty());
}

#[tokio::test]
async fn test_other_failures_keep_the_token() {
    let fx = Fixture::start(Some("tok1"), "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/images"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tags"))
        .respond_with(ResponseTemplate::new(403).set_body_string("admins only"))
        .mount(&fx.server)
        .await;

    let api = fx.api();
    let err = api.get_json::<Value>("/api/v1/images").await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError(ref body) if body == "maintenance"));

    let err = api.get_json::<Value>("/api/v1/tags").await.unwrap_err();
    assert!(matches!(err, ApiError::AccessDenied(_)));

    tokio::time::sleep(SETTLE).await;
    assert_eq!(fx.persisted().as_deref(), Some("tok1"));
    assert!(fx.navigator.history().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let fx = Fixture::start(None, "/").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&fx.server)
        .await;

    let err = fx.api().get_json::<Value>("/api/v1/users/me").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let config = Config {
        // Port 9 (discard) is not expected to accept connections
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 2,
        ..Default::default()
    };
    let api = ApiClient::new(
        &config,
        std::sync::Arc::new(MemoryTokenStore::with_token("tok1")),
        std::sync::Arc::new(MemoryNavigator::new("/dashboard")),
    )
    .unwrap();

    let err = api.get_json::<Value>("/api/v1/users/me").await.unwrap_err();
    assert!(matches!(err, ApiError::NetworkError(_)));
}
