//! Persisted token storage.
//!
//! A single bearer token under a well-known key is the only session state
//! that survives a restart. The backend is chosen once, when the session is
//! constructed:
//!
//! - [`FileTokenStore`] - JSON file in the cache directory
//! - [`KeyringTokenStore`] - OS keychain via `keyring`
//! - [`MemoryTokenStore`] - in-process, for tests and embedding hosts
//! - [`NullTokenStore`] - non-interactive contexts; never holds a token
//!
//! Token values are never logged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

/// Default key the token is stored under
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Keychain service name for [`KeyringTokenStore`]
const KEYRING_SERVICE: &str = "authkeep";

/// Token file name in cache directory
const TOKEN_FILE: &str = "session.json";

/// File permissions for the token file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

pub trait TokenStore: Send + Sync {
    /// Load the stored token. `Ok(None)` means nothing is stored.
    fn load(&self) -> Result<Option<String>>;

    /// Store a token, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the stored token. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;

    /// Backend name, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

impl<T: TokenStore + ?Sized> TokenStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, token: &str) -> Result<()> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, token: &str) -> Result<()> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Null
// ============================================================================

/// Store for contexts with no persistent surface. Always empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTokenStore;

impl TokenStore for NullTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn save(&self, _token: &str) -> Result<()> {
        debug!("Null token store: discarding token");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

// ============================================================================
// File
// ============================================================================

/// Stores the token in `session.json` as `{ "<key>": "<token>" }`.
///
/// Other keys in the file are preserved, so several stores may share one
/// directory under different keys.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    pub fn new(cache_dir: impl AsRef<Path>, key: impl Into<String>) -> Self {
        Self {
            path: cache_dir.as_ref().join(TOKEN_FILE),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token file {}", self.path.display()))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create token directory")?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(FILE_MODE))
                .context("Failed to restrict token file permissions")?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(&self.key))
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(self.key.clone(), token.to_string());
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(&self.key).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove token file {}", self.path.display()))?;
            Ok(())
        } else {
            self.write_entries(&entries)
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// Stores the token in the OS keychain, account name = storage key.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    key: String,
}

impl KeyringTokenStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, &self.key).context("Failed to create keyring entry")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
