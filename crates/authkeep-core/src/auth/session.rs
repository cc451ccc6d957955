use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::config::{Config, Endpoints};
use crate::models::{Credentials, LoginResponse, PasswordChange, ProfileUpdate, Registration, User};

use super::ScheduledTask;

/// In-memory session. `user` is only ever set while `token` is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<User>,
    /// True only while a profile fetch is in flight
    pub is_loading: bool,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match (&self.token, &self.user) {
            (None, _) => SessionPhase::Unauthenticated,
            (Some(_), None) => SessionPhase::Pending,
            (Some(_), Some(_)) => SessionPhase::Authenticated,
        }
    }
}

// Keeps the token out of logs
impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    /// Token held, profile not loaded yet
    Pending,
    Authenticated,
}

/// The authenticated user's session.
///
/// Constructed once per application run with [`SessionStore::create`] and
/// handed to whatever needs it. Clone is cheap and clones share state.
/// All operations report success as `bool` and never fail outright;
/// errors are logged.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    endpoints: Endpoints,
    state: RwLock<SessionState>,
    startup_sync: Mutex<Option<ScheduledTask>>,
}

impl SessionStore {
    /// Build the session from the persisted token.
    ///
    /// With a persisted token and no user, a single background profile sync
    /// is scheduled after the configured delay. Callers must not expect
    /// `user()` to be set right after this returns. The sync needs a tokio
    /// runtime; outside one it is skipped with a warning.
    pub fn create(api: ApiClient, config: &Config) -> Self {
        let token = match api.tokens().load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, store = api.tokens().name(), "Failed to load persisted token");
                None
            }
        };
        debug!(has_token = token.is_some(), store = api.tokens().name(), "Session created");

        let store = Self {
            inner: Arc::new(Inner {
                api,
                endpoints: config.endpoints.clone(),
                state: RwLock::new(SessionState {
                    token,
                    user: None,
                    is_loading: false,
                }),
                startup_sync: Mutex::new(None),
            }),
        };

        if store.phase() == SessionPhase::Pending {
            let delay = config.profile_sync_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Scheduling background profile sync");
            let background = store.clone();
            // Without a runtime the user stays unloaded until fetch_profile is called
            *store.startup_sync() = ScheduledTask::after(delay, async move {
                background.fetch_profile().await;
            });
        }

        store
    }

    /// Cancel pending background work: the startup sync and any login redirect
    pub fn dispose(&self) {
        if let Some(task) = self.startup_sync().take() {
            task.cancel();
        }
        self.inner.api.cancel_pending_redirect();
        debug!("Session disposed");
    }

    /// Wait for the startup profile sync, if one was scheduled.
    /// Returns `true` if a sync ran to completion.
    pub async fn settle(&self) -> bool {
        let task = self.startup_sync().take();
        match task {
            Some(task) => task.join().await,
            None => false,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    // ===== State =====

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn startup_sync(&self) -> std::sync::MutexGuard<'_, Option<ScheduledTask>> {
        self.inner.startup_sync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.read().user.as_ref().map(User::is_admin).unwrap_or(false)
    }

    /// Whether `token` is still the session's token
    fn holds(&self, token: &str) -> bool {
        self.read().token.as_deref() == Some(token)
    }

    // ===== Operations =====

    /// Sign in. The response carries both token and user, so the session
    /// becomes fully authenticated without a profile fetch.
    pub async fn login(&self, credentials: &Credentials) -> bool {
        let result = self
            .inner
            .api
            .post_form::<LoginResponse, _>(&self.inner.endpoints.login, &credentials.as_form())
            .await;

        match result {
            Ok(response) => {
                if let Err(e) = self.inner.api.tokens().save(&response.access_token) {
                    warn!(error = %e, store = self.inner.api.tokens().name(), "Failed to persist token");
                }
                info!(username = %response.user.username, "Login successful");
                {
                    let mut state = self.write();
                    state.token = Some(response.access_token);
                    state.user = Some(response.user);
                }
                // The user is already known; a pending startup sync has nothing left to do
                if let Some(task) = self.startup_sync().take() {
                    task.cancel();
                }
                true
            }
            Err(e) => {
                error!(error = %e, username = %credentials.username, "Login failed");
                false
            }
        }
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, details: &Registration) -> bool {
        match self.inner.api.post_json_unit(&self.inner.endpoints.register, details).await {
            Ok(()) => {
                info!(username = %details.username, "Registration successful");
                true
            }
            Err(e) => {
                error!(error = %e, username = %details.username, "Registration failed");
                false
            }
        }
    }

    /// Drop the session and the persisted token. Never navigates; the caller
    /// decides where to go next.
    pub fn logout(&self) {
        {
            let mut state = self.write();
            state.token = None;
            state.user = None;
        }
        if let Err(e) = self.inner.api.tokens().clear() {
            warn!(error = %e, store = self.inner.api.tokens().name(), "Failed to clear persisted token");
        }
        info!("Logged out");
    }

    /// Load the current user's profile.
    ///
    /// No-op without a token. On failure the in-memory session is dropped but
    /// the persisted token is left to the request pipeline, which clears it on
    /// a 401. A 401 here is expected and not logged as an error.
    pub async fn fetch_profile(&self) -> bool {
        let token = {
            let mut state = self.write();
            let Some(token) = state.token.clone() else {
                return false;
            };
            state.is_loading = true;
            token
        };

        // Resets is_loading even if this future is dropped mid-request
        let loading = LoadingGuard { store: self };
        let result = self.inner.api.get_json::<User>(&self.inner.endpoints.profile).await;
        drop(loading);

        let mut state = self.write();
        // A logout or new login during the fetch wins
        let still_current = state.token.as_deref() == Some(token.as_str());

        match result {
            Ok(user) if still_current => {
                debug!(username = %user.username, "Profile loaded");
                state.user = Some(user);
                true
            }
            Ok(_) => {
                debug!("Session changed during profile fetch, discarding result");
                false
            }
            Err(e) => {
                if e.is_unauthorized() {
                    debug!("Profile fetch unauthorized");
                } else {
                    error!(error = %e, "Failed to fetch profile");
                }
                if still_current {
                    state.token = None;
                    state.user = None;
                }
                false
            }
        }
    }

    /// Update username, email or password of the signed-in account and
    /// replace the user with the server's copy.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        let Some(token) = self.token() else {
            debug!("Profile update without a session");
            return false;
        };
        if update.is_empty() {
            warn!("Profile update with no fields set");
            return false;
        }

        match self.inner.api.put_json::<User, _>(&self.inner.endpoints.profile, update).await {
            Ok(user) => {
                let mut state = self.write();
                if state.token.as_deref() != Some(token.as_str()) {
                    debug!("Session changed during profile update, discarding result");
                    return false;
                }
                info!(username = %user.username, "Profile updated");
                state.user = Some(user);
                true
            }
            Err(e) => {
                error!(error = %e, "Profile update failed");
                self.drop_rejected(&token, &e);
                false
            }
        }
    }

    pub async fn change_password(&self, change: &PasswordChange) -> bool {
        let Some(token) = self.token() else {
            debug!("Password change without a session");
            return false;
        };

        match self.inner.api.put_json_unit(&self.inner.endpoints.password, change).await {
            Ok(()) => {
                info!("Password changed");
                true
            }
            Err(e) => {
                error!(error = %e, "Password change failed");
                self.drop_rejected(&token, &e);
                false
            }
        }
    }

    /// Forget an in-memory token the server just rejected
    fn drop_rejected(&self, token: &str, error: &crate::api::ApiError) {
        if error.is_unauthorized() && self.holds(token) {
            let mut state = self.write();
            state.token = None;
            state.user = None;
        }
    }
}

/// Clears `is_loading` when a profile fetch ends, however it ends
struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.write().is_loading = false;
    }
}
