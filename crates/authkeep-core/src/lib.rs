//! Client-side authentication session management.
//!
//! A [`SessionStore`] keeps the signed-in user's identity and bearer token
//! across restarts, and an [`ApiClient`] carries that token on every request
//! and invalidates the session when the server rejects it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use authkeep_core::{ApiClient, Config, Credentials, NullNavigator, SessionStore};
//!
//! let config = Config::load()?;
//! let api = ApiClient::new(&config, config.token_store()?, Arc::new(NullNavigator))?;
//! let session = SessionStore::create(api, &config);
//!
//! if session.login(&Credentials::new("alice", "secret")).await {
//!     println!("Signed in as {}", session.user().unwrap().username);
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, RedirectPolicy, UnauthorizedOutcome};
pub use auth::{
    FileTokenStore, KeyringTokenStore, MemoryNavigator, MemoryTokenStore, Navigator,
    NullNavigator, NullTokenStore, ScheduledTask, SessionPhase, SessionState, SessionStore,
    TokenStore,
};
pub use config::{Config, TokenBackend};
pub use models::{Credentials, LoginResponse, PasswordChange, ProfileUpdate, Registration, Role, User};
