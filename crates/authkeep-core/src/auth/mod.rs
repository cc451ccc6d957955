//! Authentication module for the client session lifecycle.
//!
//! This module provides:
//! - `SessionStore`: identity and token state with login/register/logout/profile
//! - `TokenStore`: the persisted token, with file, keyring, memory and null backends
//! - `Navigator`: the host's routing surface, used for the login redirect
//! - `ScheduledTask`: cancellable delayed work (startup sync, redirect)

pub mod navigator;
pub mod schedule;
pub mod session;
pub mod token_store;

pub use navigator::{MemoryNavigator, Navigator, NullNavigator};
pub use schedule::ScheduledTask;
pub use session::{SessionPhase, SessionState, SessionStore};
pub use token_store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, NullTokenStore, TokenStore,
    DEFAULT_TOKEN_KEY,
};
