//! Client configuration.
//!
//! Holds the service location, endpoint and route paths, the token backend
//! and the scheduling delays of the session lifecycle.
//!
//! Configuration is stored at `~/.config/authkeep/config.json`. Every field
//! is optional in the file; missing ones take their defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, NullTokenStore, TokenStore,
    DEFAULT_TOKEN_KEY,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "authkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Delay before the startup profile sync, so the first screen renders first.
const DEFAULT_PROFILE_SYNC_DELAY_MS: u64 = 150;

/// Delay before redirecting to login after an expired session, so pending
/// UI updates settle first.
const DEFAULT_REDIRECT_DELAY_MS: u64 = 100;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub login: String,
    pub register: String,
    pub profile: String,
    pub password: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/api/v1/auth/login".to_string(),
            register: "/api/v1/auth/register".to_string(),
            profile: "/api/v1/users/me".to_string(),
            password: "/api/v1/users/me/password".to_string(),
        }
    }
}

/// Host routes of the sign-in surfaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Routes {
    pub login: String,
    pub register: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            register: "/register".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    Memory,
    #[default]
    File,
    Keyring,
    None,
}

impl std::str::FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(TokenBackend::Memory),
            "file" => Ok(TokenBackend::File),
            "keyring" => Ok(TokenBackend::Keyring),
            "none" => Ok(TokenBackend::None),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub routes: Routes,
    pub storage_key: String,
    pub token_backend: TokenBackend,
    pub profile_sync_delay_ms: u64,
    pub redirect_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            routes: Routes::default(),
            storage_key: DEFAULT_TOKEN_KEY.to_string(),
            token_backend: TokenBackend::default(),
            profile_sync_delay_ms: DEFAULT_PROFILE_SYNC_DELAY_MS,
            redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `AUTHKEEP_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("AUTHKEEP_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(raw) = var("AUTHKEEP_TOKEN_BACKEND") {
            match raw.parse() {
                Ok(backend) => self.token_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring AUTHKEEP_TOKEN_BACKEND"),
            }
        }
    }

    pub fn profile_sync_delay(&self) -> Duration {
        Duration::from_millis(self.profile_sync_delay_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the configured token backend
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_backend {
            TokenBackend::Memory => Arc::new(MemoryTokenStore::new()),
            TokenBackend::File => Arc::new(FileTokenStore::new(self.cache_dir()?, &self.storage_key)),
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new(&self.storage_key)),
            TokenBackend::None => Arc::new(NullTokenStore),
        };
        Ok(store)
    }
}
