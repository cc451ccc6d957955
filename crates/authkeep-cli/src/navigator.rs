use std::sync::{PoisonError, RwLock};

use authkeep_core::Navigator;

/// Navigator for the terminal: a "route" is the command being run, and
/// navigating to login tells the user how to sign in again.
pub struct TerminalNavigator {
    current: RwLock<String>,
    login_route: String,
}

impl TerminalNavigator {
    pub fn new(current: impl Into<String>, login_route: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(current.into()),
            login_route: login_route.into(),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn navigate(&self, path: &str) {
        if path == self.login_route {
            eprintln!("Your session has expired. Run `authkeep login` to sign in again.");
        } else {
            eprintln!("Continue at {}", path);
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = path.to_string();
    }
}
