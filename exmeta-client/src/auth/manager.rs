//! Authentication session manager
//!
//! Owns the [`AuthSession`] and the single in-flight login task. Nothing
//! here blocks: the login runs on its own task and reports back through
//! an [`AuthEvent`] channel that the owner drains and feeds to
//! [`AuthSessionManager::handle_event`]. Attempts are numbered so that
//! events from a replaced or cancelled attempt are ignored.
//!
//! Store failures never escape this type; they degrade to logged out.

use super::login::{AuthEvent, LoginFlow, LoginResult};
use super::session::{AuthSession, ValidatedLogin};
use super::token_store::TokenStore;
use super::waiter::{AuthGate, LoginWaiter};
use crate::services::identity::{validated_display_name, IdentityProvider};
use crate::services::BrowserLauncher;
use exmeta_common::api::ApiRoutes;
use exmeta_common::config::ClientConfig;
use exmeta_common::events::{AuthState, LoginFailure};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Login timing and addressing
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub routes: ApiRoutes,
    pub callback_start_port: u16,
    pub callback_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
}

impl From<&ClientConfig> for AuthSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            routes: config.routes.clone(),
            callback_start_port: config.callback_start_port,
            callback_timeout: config.callback_timeout,
            poll_interval: config.poll_interval,
            poll_budget: config.poll_budget,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// External collaborators of the session manager
#[derive(Clone)]
pub struct AuthServices {
    pub store: Arc<dyn TokenStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub browser: Arc<dyn BrowserLauncher>,
}

/// Result of [`AuthSessionManager::login`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStart {
    Started { attempt: u64 },
    AlreadyAuthenticated,
}

/// What an [`AuthEvent`] changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReport {
    /// Event belonged to a superseded attempt
    Ignored,
    WaitingForBrowser { port: u16 },
    Authenticated { display_name: String },
    Failed(LoginFailure),
}

pub struct AuthSessionManager {
    settings: AuthSettings,
    services: AuthServices,
    session: AuthSession,
    cached_port: Option<u16>,
    attempt: u64,
    login_task: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<AuthEvent>,
}

impl AuthSessionManager {
    /// Create a logged-out manager and the receiver for its login events
    pub fn new(
        settings: AuthSettings,
        services: AuthServices,
    ) -> (Self, mpsc::UnboundedReceiver<AuthEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            settings,
            services,
            session: AuthSession::logged_out(),
            cached_port: None,
            attempt: 0,
            login_task: None,
            events_tx,
        };
        (manager, events_rx)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn state(&self) -> AuthState {
        if self.session.is_authenticated() {
            AuthState::Authenticated
        } else if self.login_task.is_some() {
            AuthState::LoggingIn
        } else {
            AuthState::LoggedOut
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Port of the most recent successfully bound callback listener
    pub fn cached_port(&self) -> Option<u16> {
        self.cached_port
    }

    /// Start a browser login, replacing any attempt already running
    ///
    /// The replaced attempt's task is aborted and fully torn down before
    /// the new attempt binds its listener.
    pub fn login(&mut self) -> LoginStart {
        if self.session.is_authenticated() {
            debug!("Login requested while already authenticated");
            return LoginStart::AlreadyAuthenticated;
        }

        self.attempt += 1;
        let attempt = self.attempt;

        let previous = self.login_task.take();
        if let Some(previous) = &previous {
            debug!(attempt, "Replacing running login attempt");
            previous.abort();
        }

        let flow = LoginFlow {
            routes: self.settings.routes.clone(),
            store: self.services.store.clone(),
            identity: self.services.identity.clone(),
            browser: self.services.browser.clone(),
            start_port: self.settings.callback_start_port,
            callback_timeout: self.settings.callback_timeout,
        };
        let cached_port = self.cached_port;
        let events = self.events_tx.clone();

        info!(attempt, "Starting browser login");
        self.login_task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            flow.run(attempt, cached_port, events).await;
        }));

        LoginStart::Started { attempt }
    }

    /// Abort the running login, if any; its late events are ignored
    pub fn cancel_login(&mut self) {
        if let Some(task) = self.login_task.take() {
            task.abort();
            self.attempt += 1;
            debug!(attempt = self.attempt, "Login attempt cancelled");
        }
    }

    /// Forget the session and delete the stored token
    pub fn logout(&mut self) {
        self.cancel_login();
        if let Err(e) = self.services.store.clear() {
            warn!(error = %e, "Could not remove stored token");
        }
        self.session = AuthSession::logged_out();
        info!("Logged out");
    }

    /// Re-check a stored token at startup
    ///
    /// A token the server no longer accepts is deleted. Any store or
    /// network failure leaves the manager logged out.
    pub async fn revalidate(&mut self) -> bool {
        let token = match self.services.store.get() {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                debug!("No stored token to revalidate");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Token store unavailable during revalidation");
                self.discard_stored_token();
                return false;
            }
        };

        match validated_display_name(self.services.identity.as_ref(), &token).await {
            Some(display_name) => {
                info!(display_name = %display_name, "Stored session is valid");
                self.session = AuthSession::from_validated(ValidatedLogin::new(token, display_name));
                true
            }
            None => {
                info!("Stored token is no longer accepted");
                self.discard_stored_token();
                false
            }
        }
    }

    /// Apply a message posted by the login task
    pub fn handle_event(&mut self, event: AuthEvent) -> LoginReport {
        match event {
            AuthEvent::ListenerReady { attempt, port } => {
                if attempt != self.attempt {
                    return LoginReport::Ignored;
                }
                self.cached_port = Some(port);
                LoginReport::WaitingForBrowser { port }
            }
            AuthEvent::LoginFinished { attempt, result } => {
                if attempt != self.attempt {
                    debug!(attempt, current = self.attempt, "Ignoring stale login result");
                    return LoginReport::Ignored;
                }
                self.login_task = None;

                match result {
                    LoginResult::Validated(login) => {
                        let display_name = login.display_name.clone();
                        self.session = AuthSession::from_validated(login);
                        LoginReport::Authenticated { display_name }
                    }
                    LoginResult::NoToken => {
                        self.session = AuthSession::logged_out();
                        LoginReport::Failed(LoginFailure::NoTokenReceived)
                    }
                    LoginResult::ValidationFailed => {
                        self.session = AuthSession::logged_out();
                        LoginReport::Failed(LoginFailure::TokenRejected)
                    }
                    LoginResult::Failed(e) => {
                        warn!(error = %e, "Login attempt failed");
                        self.session = AuthSession::logged_out();
                        LoginReport::Failed(LoginFailure::Error(e.to_string()))
                    }
                }
            }
        }
    }

    /// Return `Ready`, or start (or reuse) a login and hand back a poller
    pub fn gate(&mut self) -> AuthGate {
        if self.session.is_authenticated() {
            return AuthGate::Ready;
        }
        let running = self
            .login_task
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !running {
            self.login();
        }
        AuthGate::Waiting(LoginWaiter::new(
            self.services.store.clone(),
            self.services.identity.clone(),
            self.settings.poll_interval,
            self.settings.poll_budget,
        ))
    }

    /// Adopt a login detected by a [`LoginWaiter`]
    pub fn apply_validated(&mut self, login: ValidatedLogin) {
        self.cancel_login();
        self.session = AuthSession::from_validated(login);
    }

    /// `true` at once when authenticated; otherwise log in and poll the store
    pub async fn ensure_authenticated(&mut self) -> bool {
        match self.gate() {
            AuthGate::Ready => true,
            AuthGate::Waiting(waiter) => match waiter.wait().await {
                Some(login) => {
                    self.apply_validated(login);
                    true
                }
                None => false,
            },
        }
    }

    fn discard_stored_token(&mut self) {
        self.session = AuthSession::logged_out();
        if let Err(e) = self.services.store.clear() {
            warn!(error = %e, "Could not remove stale token");
        }
    }
}

impl Drop for AuthSessionManager {
    fn drop(&mut self) {
        if let Some(task) = self.login_task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for AuthSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionManager")
            .field("session", &self.session)
            .field("state", &self.state())
            .field("attempt", &self.attempt)
            .field("cached_port", &self.cached_port)
            .finish()
    }
}
