//! HTTP client wrapped in the session's request/response pipeline.
//!
//! Every request built through [`ApiClient`] passes two stages:
//!
//! - outbound: the persisted token, if any, is attached as a bearer credential
//! - inbound: a 401 clears the persisted token and, unless the user is already
//!   on a sign-in surface or the failing call was the login itself, schedules
//!   a redirect to the login route
//!
//! The pipeline reads the token store directly rather than the session, and
//! never swallows a failure: the error always reaches the caller after the
//! handler has run.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{Navigator, ScheduledTask, TokenStore};
use crate::config::Config;

use super::error::is_auth_failure;
use super::ApiError;

/// Where to send the user when their session expires, and when not to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    /// Route navigated to after an expired session
    pub login_route: String,
    /// Routes on which no redirect happens (login, registration)
    pub auth_routes: Vec<String>,
    /// Endpoint whose own 401 never redirects (a failed login attempt)
    pub login_endpoint: String,
    pub delay: Duration,
}

impl RedirectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login_route: config.routes.login.clone(),
            auth_routes: vec![config.routes.login.clone(), config.routes.register.clone()],
            login_endpoint: config.endpoints.login.clone(),
            delay: config.redirect_delay(),
        }
    }

    fn on_auth_route(&self, current_path: &str) -> bool {
        self.auth_routes.iter().any(|route| current_path.contains(route.as_str()))
    }

    fn is_login_call(&self, request_path: &str) -> bool {
        request_path.contains(self.login_endpoint.as_str())
    }

    /// Whether a 401 on `request_path` while the user is on `current_path`
    /// should send them to the login route
    pub fn should_redirect(&self, current_path: &str, request_path: &str) -> bool {
        !self.on_auth_route(current_path) && !self.is_login_call(request_path)
    }
}

/// What the inbound stage did with an authorization failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedOutcome {
    /// No token was persisted; nothing to invalidate
    NoToken,
    /// Persisted token cleared, redirect suppressed
    Cleared,
    /// Persisted token cleared and a redirect to login scheduled
    RedirectScheduled,
}

/// API client for the auth service.
/// Clone is cheap - reqwest::Client and the collaborators are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    policy: Arc<RedirectPolicy>,
    pending_redirect: Arc<Mutex<Option<ScheduledTask>>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        config: &Config,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            navigator,
            policy: Arc::new(RedirectPolicy::from_config(config)),
            pending_redirect: Arc::new(Mutex::new(None)),
        })
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Outbound =====

    /// Start a request to `path` with the persisted token attached
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.attach_token(self.client.request(method, self.url(path)))
    }

    fn attach_token(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.load() {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => builder,
            Err(e) => {
                warn!(error = %e, store = self.tokens.name(), "Failed to read persisted token, sending unauthenticated");
                builder
            }
        }
    }

    // ===== Inbound =====

    /// Send a request built with [`ApiClient::request`] and run the inbound stage
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build()?;
        let path = request.url().path().to_string();
        debug!(method = %request.method(), path = %path, "Sending request");

        let response = self.client.execute(request).await?;
        self.check_response(&path, response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(&self, path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if is_auth_failure(status) {
            self.handle_unauthorized(path);
        }
        Err(ApiError::from_status(status, &body))
    }

    /// React to an authorization failure on `request_path`.
    ///
    /// Clears the persisted token if one was present and schedules the
    /// redirect to login unless a loop guard applies. A redirect still pending
    /// from an earlier failure is replaced. Outside a tokio runtime the
    /// redirect cannot be scheduled and the outcome is `Cleared`.
    pub fn handle_unauthorized(&self, request_path: &str) -> UnauthorizedOutcome {
        let had_token = match self.tokens.load() {
            Ok(token) => token.is_some(),
            // An unreadable store never attached a token either
            Err(e) => {
                warn!(error = %e, store = self.tokens.name(), "Failed to read persisted token");
                false
            }
        };
        if !had_token {
            debug!(path = request_path, "Unauthorized without a persisted token");
            return UnauthorizedOutcome::NoToken;
        }

        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, store = self.tokens.name(), "Failed to clear persisted token");
        }

        let current_path = self.navigator.current_path();
        if !self.policy.should_redirect(&current_path, request_path) {
            info!(path = request_path, current = %current_path, "Session token rejected, staying on current page");
            return UnauthorizedOutcome::Cleared;
        }

        info!(path = request_path, current = %current_path, "Session expired, redirecting to login");
        let navigator = self.navigator.clone();
        let target = self.policy.login_route.clone();
        let Some(task) = ScheduledTask::after(self.policy.delay, async move {
            navigator.navigate(&target);
        }) else {
            return UnauthorizedOutcome::Cleared;
        };

        let mut pending = self.pending_redirect.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(task) {
            previous.cancel();
        }
        UnauthorizedOutcome::RedirectScheduled
    }

    /// Cancel a scheduled login redirect, if one has not fired yet
    pub fn cancel_pending_redirect(&self) {
        if let Some(task) = self
            .pending_redirect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.cancel();
        }
    }

    // ===== Typed helpers =====

    async fn parse<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", path, e)))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        Self::parse(path, response).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::POST, path).json(body)).await?;
        Self::parse(path, response).await
    }

    /// POST a form-encoded body
    pub async fn post_form<T: DeserializeOwned, F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::POST, path).form(form)).await?;
        Self::parse(path, response).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::PUT, path).json(body)).await?;
        Self::parse(path, response).await
    }

    /// POST JSON to an endpoint whose response body is not needed
    pub async fn post_json_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.execute(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    /// PUT JSON to an endpoint whose response body is not needed
    pub async fn put_json_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.execute(self.request(Method::PUT, path).json(body)).await?;
        Ok(())
    }
}
