//! Navigation surface of the host application.
//!
//! The request pipeline sends the user to the login route when a session
//! expires. What "navigating" means is up to the host: a TUI switches
//! screens, a CLI prints a hint, a webview changes location.

use std::sync::{PoisonError, RwLock};

use tracing::debug;

pub trait Navigator: Send + Sync {
    /// Route the user is currently on, e.g. `/dashboard`
    fn current_path(&self) -> String;

    /// Move the user to `path`
    fn navigate(&self, path: &str);
}

impl<T: Navigator + ?Sized> Navigator for std::sync::Arc<T> {
    fn current_path(&self) -> String {
        (**self).current_path()
    }

    fn navigate(&self, path: &str) {
        (**self).navigate(path)
    }
}

/// Navigator for non-interactive contexts. Sits on `/` and ignores navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn navigate(&self, path: &str) {
        debug!(path, "Null navigator: ignoring navigation");
    }
}

/// In-process navigator that tracks the current route and every navigation.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: RwLock<NavState>,
}

#[derive(Debug)]
struct NavState {
    current: String,
    history: Vec<String>,
}

impl MemoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(NavState {
                current: start.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Paths navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).history.clone()
    }

    /// Move without recording a navigation, as when the user follows a link
    pub fn set_current(&self, path: impl Into<String>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).current = path.into();
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.state.read().unwrap_or_else(PoisonError::into_inner).current.clone()
    }

    fn navigate(&self, path: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.current = path.to_string();
        state.history.push(path.to_string());
    }
}
