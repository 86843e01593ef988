// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Auth/Session State Holder
//!
//! Single source of truth for "are we signed in, as whom, with what token".
//! [`SessionManager`] owns the backend client, the token store and the
//! [`Watchdog`]; every mutation goes through `&mut self`, so there is exactly
//! one writer at a time.
//!
//! ## Lifecycle
//!
//! - Created empty.
//! - Populated by [`SessionManager::login`] or by [`SessionManager::initialize`]
//!   validating a persisted token.
//! - Refreshed by activity and by the warning/countdown flow.
//! - Cleared by explicit logout, forced idle logout, or token rejection.
//!
//! Every failure path ends in the same observable outcome:
//! `is_authenticated() == false` plus an optional message.

use tokio::sync::watch;
use tokio::time::Instant;

use super::watchdog::{Watchdog, WatchdogConfig, WatchdogEvent, WatchdogPhase};
use crate::api::{ApiError, AuthBackend};
use crate::models::{Credentials, User};
use crate::storage::TokenStore;
use crate::utils::mask_token;

/// Reason stored when the countdown runs out.
pub const INACTIVITY_MESSAGE: &str = "Session expired due to inactivity.";

/// Reason stored when the backend rejects the token mid-session.
pub const TOKEN_REJECTED_MESSAGE: &str = "Your session is no longer valid. Please sign in again.";

/// Set after a login whose token could not be written to the store.
pub const TOKEN_NOT_SAVED_MESSAGE: &str =
    "Signed in, but the session could not be saved. You will need to sign in again next time.";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutKind {
    /// User asked to log out
    Manual,
    /// Watchdog countdown reached zero
    Inactivity,
    /// Backend refused the token
    TokenRejected,
}

impl LogoutKind {
    /// True when the logout was not requested by the user.
    pub fn is_forced(&self) -> bool {
        !matches!(self, LogoutKind::Manual)
    }
}

impl std::fmt::Display for LogoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoutKind::Manual => write!(f, "manual"),
            LogoutKind::Inactivity => write!(f, "inactivity"),
            LogoutKind::TokenRejected => write!(f, "token_rejected"),
        }
    }
}

/// Notifications for whoever renders the session (dialog, status line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    WarningStarted { remaining: u32 },
    CountdownTick { remaining: u32 },
    WarningDismissed,
    LoggedOut { kind: LogoutKind, reason: Option<String> },
}

/// Authenticated state. Deadlines and countdown live on the watchdog.
#[derive(Debug, Default, Clone)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
    message: Option<String>,
    last_logout: Option<LogoutKind>,
}

/// Session lifecycle manager.
pub struct SessionManager<B: AuthBackend, S: TokenStore> {
    backend: B,
    store: S,
    state: SessionState,
    loading: watch::Sender<bool>,
    watchdog: Watchdog,
}

impl<B: AuthBackend, S: TokenStore> SessionManager<B, S> {
    pub fn new(backend: B, store: S, config: WatchdogConfig) -> Self {
        Self {
            backend,
            store,
            state: SessionState::default(),
            loading: watch::channel(false).0,
            watchdog: Watchdog::new(config),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn is_authenticated(&self) -> bool {
        self.state.token.is_some() && self.state.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    /// True while `initialize` is waiting on the backend.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Follow the loading flag from another task, e.g. to show a spinner
    /// while `initialize` runs.
    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Last error or logout reason for display.
    pub fn message(&self) -> Option<&str> {
        self.state.message.as_deref()
    }

    pub fn last_logout(&self) -> Option<LogoutKind> {
        self.state.last_logout
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.watchdog.phase()
    }

    pub fn is_warning_active(&self) -> bool {
        self.watchdog.is_warning()
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.watchdog.countdown_remaining()
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.watchdog.idle_deadline()
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Clear a displayed message without touching the session.
    pub fn clear_message(&mut self) {
        self.state.message = None;
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Restore a session from the persisted token.
    ///
    /// Never fails: a missing, rejected or unverifiable token leaves the
    /// session unauthenticated. Returns whether the session is now signed in.
    pub async fn initialize(&mut self, now: Instant) -> bool {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("SESSION_INIT | no persisted token");
                return false;
            }
            Err(e) => {
                tracing::warn!("SESSION_INIT | could not read token store: {}", e);
                self.discard_persisted_token();
                return false;
            }
        };

        self.loading.send_replace(true);
        self.backend.set_token(Some(token.clone()));
        let result = self.backend.current_user(&token).await;
        self.loading.send_replace(false);

        match result {
            Ok(user) => {
                tracing::info!(
                    "SESSION_RESTORED | user={} token={}",
                    user.display_name(),
                    mask_token(&token)
                );
                self.establish(token, user, now);
                true
            }
            Err(e) => {
                tracing::warn!("SESSION_INIT_FAILED | token={} error={}", mask_token(&token), e);
                self.backend.set_token(None);
                self.discard_persisted_token();
                self.state.token = None;
                self.state.user = None;
                self.watchdog.stop();
                false
            }
        }
    }

    /// Sign in. On failure the message is set and the previous session, if
    /// any, is left exactly as it was.
    pub async fn login(&mut self, credentials: &Credentials, now: Instant) -> Result<User, ApiError> {
        self.state.message = None;

        let outcome = self.authenticate(credentials).await;
        match outcome {
            Ok((token, user)) => {
                tracing::info!(
                    "SESSION_LOGIN | user={} token={}",
                    user.display_name(),
                    mask_token(&token)
                );
                let saved = self.store.save(&token);
                self.establish(token, user.clone(), now);
                if let Err(e) = saved {
                    // Signed in for this run only.
                    tracing::warn!("SESSION_LOGIN | token not persisted: {}", e);
                    self.state.message = Some(TOKEN_NOT_SAVED_MESSAGE.to_string());
                }
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("SESSION_LOGIN_FAILED | email={} error={}", credentials.email, e);
                // Restore whatever token the previous session had attached.
                self.backend.set_token(self.state.token.clone());
                self.state.message = Some(login_failure_message(&e));
                Err(e)
            }
        }
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(String, User), ApiError> {
        let token = self.backend.login(credentials).await?;
        self.backend.set_token(Some(token.clone()));
        let user = self.backend.current_user(&token).await?;
        Ok((token, user))
    }

    fn establish(&mut self, token: String, user: User, now: Instant) {
        self.backend.set_token(Some(token.clone()));
        self.state.token = Some(token);
        self.state.user = Some(user);
        self.state.last_logout = None;
        self.watchdog.start(now);
    }

    fn discard_persisted_token(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("SESSION | could not remove persisted token: {}", e);
        }
    }

    /// Explicit logout. Idempotent.
    pub fn logout(&mut self, reason: Option<&str>) -> Option<SessionNotice> {
        self.end_session(LogoutKind::Manual, reason.map(str::to_string))
    }

    fn end_session(&mut self, kind: LogoutKind, reason: Option<String>) -> Option<SessionNotice> {
        let was_authenticated = self.is_authenticated();

        self.watchdog.stop();
        self.discard_persisted_token();
        self.backend.set_token(None);
        self.state.token = None;
        self.state.user = None;
        if reason.is_some() {
            self.state.message = reason.clone();
        }

        if !was_authenticated {
            return None;
        }

        self.state.last_logout = Some(kind);
        tracing::info!(
            "SESSION_LOGOUT | kind={} forced={} reason={}",
            kind,
            kind.is_forced(),
            reason.as_deref().unwrap_or("-")
        );
        Some(SessionNotice::LoggedOut { kind, reason })
    }

    /// Push the idle deadline to `now + idle window`. This is what user
    /// activity (pointer, key, scroll, touch, input line) calls, and what
    /// `continue_session` calls once the warning is closed.
    ///
    /// No-op when signed out, and while the warning is open: only an explicit
    /// continue dismisses it. Returns whether the deadline moved.
    pub fn reset_idle_deadline(&mut self, now: Instant) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.watchdog.record_activity(now)
    }

    /// The "continue" button on the warning dialog.
    pub fn continue_session(&mut self, now: Instant) -> Option<SessionNotice> {
        if !self.is_authenticated() {
            return None;
        }
        let event = self.watchdog.dismiss_warning()?;
        self.reset_idle_deadline(now);
        tracing::info!("SESSION_CONTINUED | idle timer restarted");
        self.translate(event)
    }

    /// Deadline of the next armed timer, for the driver to sleep on.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.watchdog.next_deadline().map(|(_, deadline)| deadline)
    }

    /// Fire due timers and apply their transitions.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<SessionNotice> {
        let events = self.watchdog.poll(now);
        events.into_iter().filter_map(|e| self.translate(e)).collect()
    }

    fn translate(&mut self, event: WatchdogEvent) -> Option<SessionNotice> {
        match event {
            WatchdogEvent::WarningStarted { remaining } => {
                tracing::warn!("SESSION_WARNING | countdown={}s", remaining);
                Some(SessionNotice::WarningStarted { remaining })
            }
            WatchdogEvent::CountdownTick { remaining } => {
                tracing::trace!("SESSION_COUNTDOWN | remaining={}s", remaining);
                Some(SessionNotice::CountdownTick { remaining })
            }
            WatchdogEvent::WarningDismissed => Some(SessionNotice::WarningDismissed),
            WatchdogEvent::Expired => {
                self.end_session(LogoutKind::Inactivity, Some(INACTIVITY_MESSAGE.to_string()))
            }
        }
    }

    /// Route an error from any authenticated call. A rejected token ends the
    /// session at once, whatever the watchdog phase.
    pub fn handle_api_error(&mut self, error: &ApiError) -> Option<SessionNotice> {
        if !error.is_auth_failure() {
            return None;
        }
        self.end_session(LogoutKind::TokenRejected, Some(TOKEN_REJECTED_MESSAGE.to_string()))
    }

    /// Pass a result through, ending the session if it carries a token
    /// rejection.
    pub fn observe<T>(&mut self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ref e) = result {
            self.handle_api_error(e);
        }
        result
    }

    /// Teardown: cancel every timer without touching the persisted token.
    pub fn shutdown(&mut self) {
        self.watchdog.stop();
    }
}

fn login_failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Credentials(msg) => msg.clone(),
        ApiError::Network(_) => "Could not reach the server. Please try again.".to_string(),
        ApiError::TokenRejected => "Login failed".to_string(),
        other => format!("Login failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTokenStore, StorageError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    const GOOD_TOKEN: &str = "tok-good";

    /// Backend double: one valid account, one valid token.
    #[derive(Default)]
    struct FakeBackend {
        unreachable: bool,
        attached: Option<String>,
        whoami_calls: Arc<AtomicUsize>,
        /// Identity check waits here when set
        gate: Option<Arc<Notify>>,
    }

    /// Store that cannot persist anything.
    struct ReadOnlyStore;

    impl TokenStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn save(&self, _token: &str) -> Result<(), StorageError> {
            Err(StorageError::LockTimeout(Duration::from_secs(5)))
        }

        fn clear(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn leah() -> User {
        User {
            id: "u1".into(),
            name: Some("Leah".into()),
            email: Some("leah@example.com".into()),
            role: None,
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
            if self.unreachable {
                return Err(ApiError::Network("connection refused".into()));
            }
            if credentials.email == "leah@example.com" && credentials.password == "pw" {
                Ok(GOOD_TOKEN.into())
            } else {
                Err(ApiError::Credentials("Invalid credentials".into()))
            }
        }

        async fn current_user(&self, token: &str) -> Result<User, ApiError> {
            self.whoami_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.unreachable {
                return Err(ApiError::Network("connection refused".into()));
            }
            if token == GOOD_TOKEN {
                Ok(leah())
            } else {
                Err(ApiError::TokenRejected)
            }
        }

        fn set_token(&mut self, token: Option<String>) {
            self.attached = token;
        }
    }

    fn manager(store: MemoryTokenStore) -> SessionManager<FakeBackend, MemoryTokenStore> {
        SessionManager::new(FakeBackend::default(), store, WatchdogConfig::default())
    }

    fn good() -> Credentials {
        Credentials::new("leah@example.com", "pw")
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test]
    async fn test_initialize_without_token() {
        let mut m = manager(MemoryTokenStore::new());
        assert!(!m.initialize(Instant::now()).await);
        assert!(!m.is_authenticated());
        assert!(!m.is_loading());
        assert_eq!(m.backend().whoami_calls.load(Ordering::SeqCst), 0);
        assert_eq!(m.phase(), WatchdogPhase::Idle);
    }

    #[tokio::test]
    async fn test_initialize_with_valid_token() {
        let mut m = manager(MemoryTokenStore::with_token(GOOD_TOKEN));
        let now = Instant::now();
        assert!(m.initialize(now).await);
        assert_eq!(m.user(), Some(&leah()));
        assert_eq!(m.backend().attached.as_deref(), Some(GOOD_TOKEN));
        assert_eq!(m.phase(), WatchdogPhase::Active);
        assert_eq!(m.idle_deadline(), Some(now + secs(540)));
    }

    #[tokio::test]
    async fn test_loading_visible_while_identity_check_runs() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let mut m = SessionManager::new(
            backend,
            MemoryTokenStore::with_token(GOOD_TOKEN),
            WatchdogConfig::default(),
        );
        let mut loading = m.watch_loading();
        assert!(!*loading.borrow());

        let task = tokio::spawn(async move {
            let restored = m.initialize(Instant::now()).await;
            (m, restored)
        });

        loading.wait_for(|busy| *busy).await.unwrap();
        gate.notify_one();

        let (m, restored) = task.await.unwrap();
        assert!(restored);
        assert!(!m.is_loading());
        assert!(!*loading.borrow());
    }

    #[tokio::test]
    async fn test_initialize_with_rejected_token_discards_it() {
        let mut m = manager(MemoryTokenStore::with_token("tok-stale"));
        assert!(!m.initialize(Instant::now()).await);
        assert!(!m.is_authenticated());
        assert_eq!(m.store().load().unwrap(), None);
        assert_eq!(m.backend().attached, None);
        assert_eq!(m.phase(), WatchdogPhase::Idle);
    }

    #[tokio::test]
    async fn test_initialize_network_error_is_unauthenticated() {
        let backend = FakeBackend {
            unreachable: true,
            ..Default::default()
        };
        let mut m = SessionManager::new(
            backend,
            MemoryTokenStore::with_token(GOOD_TOKEN),
            WatchdogConfig::default(),
        );
        assert!(!m.initialize(Instant::now()).await);
        assert!(!m.is_authenticated());
        assert_eq!(m.store().load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_success_persists_and_starts_watchdog() {
        let mut m = manager(MemoryTokenStore::new());
        let now = Instant::now();
        let user = m.login(&good(), now).await.unwrap();
        assert_eq!(user, leah());
        assert!(m.is_authenticated());
        assert_eq!(m.token(), Some(GOOD_TOKEN));
        assert_eq!(m.store().load().unwrap().as_deref(), Some(GOOD_TOKEN));
        assert_eq!(m.backend().attached.as_deref(), Some(GOOD_TOKEN));
        assert_eq!(m.phase(), WatchdogPhase::Active);
        assert_eq!(m.message(), None);
    }

    #[tokio::test]
    async fn test_login_reports_unsaved_token() {
        let mut m = SessionManager::new(FakeBackend::default(), ReadOnlyStore, WatchdogConfig::default());
        let user = m.login(&good(), Instant::now()).await.unwrap();
        assert_eq!(user, leah());
        assert!(m.is_authenticated());
        assert_eq!(m.phase(), WatchdogPhase::Active);
        assert_eq!(m.message(), Some(TOKEN_NOT_SAVED_MESSAGE));
    }

    #[tokio::test]
    async fn test_login_failure_sets_message_and_keeps_state() {
        let mut m = manager(MemoryTokenStore::new());
        let err = m
            .login(&Credentials::new("leah@example.com", "wrong"), Instant::now())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Credentials("Invalid credentials".into()));
        assert_eq!(m.message(), Some("Invalid credentials"));
        assert!(!m.is_authenticated());
        assert_eq!(m.store().load().unwrap(), None);
        assert_eq!(m.phase(), WatchdogPhase::Idle);
    }

    #[tokio::test]
    async fn test_failed_relogin_leaves_existing_session_untouched() {
        let mut m = manager(MemoryTokenStore::new());
        let t0 = Instant::now();
        m.login(&good(), t0).await.unwrap();
        let deadline = m.idle_deadline();

        assert!(m
            .login(&Credentials::new("x@example.com", "nope"), t0 + secs(5))
            .await
            .is_err());
        assert!(m.is_authenticated());
        assert_eq!(m.token(), Some(GOOD_TOKEN));
        assert_eq!(m.backend().attached.as_deref(), Some(GOOD_TOKEN));
        assert_eq!(m.store().load().unwrap().as_deref(), Some(GOOD_TOKEN));
        assert_eq!(m.idle_deadline(), deadline);
    }

    #[tokio::test]
    async fn test_login_network_error_message() {
        let backend = FakeBackend {
            unreachable: true,
            ..Default::default()
        };
        let mut m = SessionManager::new(backend, MemoryTokenStore::new(), WatchdogConfig::default());
        let err = m.login(&good(), Instant::now()).await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(m.message(), Some("Could not reach the server. Please try again."));
        assert!(!m.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_then_reload_round_trip() {
        let store = MemoryTokenStore::new();
        let mut first = manager(store);
        let user = first.login(&good(), Instant::now()).await.unwrap();
        let token = first.store().load().unwrap().unwrap();

        let mut reloaded = manager(MemoryTokenStore::with_token(token));
        assert!(reloaded.initialize(Instant::now()).await);
        assert_eq!(reloaded.user(), Some(&user));
        assert_eq!(reloaded.is_authenticated(), first.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let mut m = manager(MemoryTokenStore::new());
        assert_eq!(m.logout(None), None);

        m.login(&good(), Instant::now()).await.unwrap();
        let notice = m.logout(None);
        assert_eq!(
            notice,
            Some(SessionNotice::LoggedOut {
                kind: LogoutKind::Manual,
                reason: None
            })
        );
        assert_eq!(m.logout(None), None);

        assert!(!m.is_authenticated());
        assert_eq!(m.user(), None);
        assert_eq!(m.store().load().unwrap(), None);
        assert_eq!(m.backend().attached, None);
        assert_eq!(m.watchdog().live_timers(), 0);
        assert_eq!(m.last_logout(), Some(LogoutKind::Manual));
    }

    #[tokio::test]
    async fn test_logout_reason_is_stored() {
        let mut m = manager(MemoryTokenStore::new());
        m.login(&good(), Instant::now()).await.unwrap();
        m.logout(Some("Signed out from another device"));
        assert_eq!(m.message(), Some("Signed out from another device"));
    }

    #[tokio::test]
    async fn test_activity_ignored_when_signed_out() {
        let mut m = manager(MemoryTokenStore::new());
        let now = Instant::now();
        assert!(!m.reset_idle_deadline(now));
        assert_eq!(m.idle_deadline(), None);
    }

    #[tokio::test]
    async fn test_reset_idle_deadline_while_active_and_warning() {
        let mut m = manager(MemoryTokenStore::new());
        let t0 = Instant::now();
        m.login(&good(), t0).await.unwrap();

        assert!(m.reset_idle_deadline(t0 + secs(100)));
        assert_eq!(m.idle_deadline(), Some(t0 + secs(640)));

        m.poll_timers(t0 + secs(640));
        assert!(m.is_warning_active());
        // Plain activity does not close the warning.
        assert!(!m.reset_idle_deadline(t0 + secs(645)));
        assert!(m.is_warning_active());
        assert_eq!(m.countdown_remaining(), Some(60));
    }

    #[tokio::test]
    async fn test_forced_logout_after_countdown() {
        let mut m = manager(MemoryTokenStore::new());
        let t0 = Instant::now();
        m.login(&good(), t0).await.unwrap();

        let notices = m.poll_timers(t0 + secs(540));
        assert_eq!(notices, vec![SessionNotice::WarningStarted { remaining: 60 }]);
        assert!(m.is_warning_active());

        let notices = m.poll_timers(t0 + secs(600));
        assert_eq!(notices.len(), 60);
        assert_eq!(
            notices.last(),
            Some(&SessionNotice::LoggedOut {
                kind: LogoutKind::Inactivity,
                reason: Some(INACTIVITY_MESSAGE.to_string()),
            })
        );
        assert!(!m.is_authenticated());
        assert!(!m.is_warning_active());
        assert_eq!(m.message(), Some(INACTIVITY_MESSAGE));
        assert_eq!(m.last_logout(), Some(LogoutKind::Inactivity));
        assert!(m.last_logout().unwrap().is_forced());
        assert_eq!(m.store().load().unwrap(), None);
        assert_eq!(m.next_timer_deadline(), None);
    }

    #[tokio::test]
    async fn test_continue_resets_idle_timer() {
        let mut m = manager(MemoryTokenStore::new());
        let t0 = Instant::now();
        m.login(&good(), t0).await.unwrap();
        m.poll_timers(t0 + secs(585));
        assert_eq!(m.countdown_remaining(), Some(15));

        assert_eq!(m.continue_session(t0 + secs(585)), Some(SessionNotice::WarningDismissed));
        assert!(!m.is_warning_active());
        assert!(m.is_authenticated());
        assert_eq!(m.idle_deadline(), Some(t0 + secs(1125)));
    }

    #[tokio::test]
    async fn test_token_rejection_forces_logout_in_any_phase() {
        let mut m = manager(MemoryTokenStore::new());
        let t0 = Instant::now();
        m.login(&good(), t0).await.unwrap();

        assert_eq!(m.handle_api_error(&ApiError::NotFound("article".into())), None);
        assert!(m.is_authenticated());

        m.poll_timers(t0 + secs(550));
        assert!(m.is_warning_active());

        let result: Result<(), ApiError> = m.observe(Err(ApiError::TokenRejected));
        assert!(result.is_err());
        assert!(!m.is_authenticated());
        assert!(!m.is_warning_active());
        assert_eq!(m.last_logout(), Some(LogoutKind::TokenRejected));
        assert_eq!(m.message(), Some(TOKEN_REJECTED_MESSAGE));
        assert_eq!(m.watchdog().live_timers(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_token() {
        let mut m = manager(MemoryTokenStore::new());
        m.login(&good(), Instant::now()).await.unwrap();
        m.shutdown();
        assert_eq!(m.watchdog().live_timers(), 0);
        assert_eq!(m.store().load().unwrap().as_deref(), Some(GOOD_TOKEN));
    }
}
