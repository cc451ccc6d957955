//! Shared fixtures for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use authkeep_core::{ApiClient, Config, MemoryNavigator, MemoryTokenStore, SessionStore};

/// Redirect delay used by the fixtures
pub const REDIRECT_DELAY: Duration = Duration::from_millis(20);

/// Comfortably longer than any fixture delay
pub const SETTLE: Duration = Duration::from_millis(250);

pub struct Fixture {
    pub server: MockServer,
    pub config: Config,
    pub tokens: Arc<MemoryTokenStore>,
    pub navigator: Arc<MemoryNavigator>,
}

impl Fixture {
    /// Mock service plus in-memory collaborators. `token` seeds the persisted
    /// token, `path` is the route the user is on.
    pub async fn start(token: Option<&str>, path: &str) -> Self {
        let server = MockServer::start().await;
        let config = Config {
            base_url: server.uri(),
            profile_sync_delay_ms: 10,
            redirect_delay_ms: REDIRECT_DELAY.as_millis() as u64,
            request_timeout_secs: 5,
            ..Default::default()
        };
        let tokens = Arc::new(match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::new(),
        });
        let navigator = Arc::new(MemoryNavigator::new(path));
        Self {
            server,
            config,
            tokens,
            navigator,
        }
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.config, self.tokens.clone(), self.navigator.clone())
            .expect("Failed to build API client")
    }

    pub fn session(&self) -> SessionStore {
        SessionStore::create(self.api(), &self.config)
    }

    pub fn persisted(&self) -> Option<String> {
        use authkeep_core::TokenStore;
        self.tokens.load().expect("Memory store never fails")
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

pub fn user_json(id: i64, username: &str, role: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "role": role,
        "is_active": true,
        "created_at": "2024-05-01T10:00:00",
        "updated_at": null
    })
}

pub fn login_json(token: &str, user: Value) -> Value {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "user": user
    })
}
