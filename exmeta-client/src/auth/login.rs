//! One browser login attempt
//!
//! Binds the callback listener first, then opens the login page, so the
//! redirect can never arrive before something is listening for it.

use super::callback::{CallbackError, CallbackListener};
use super::port::{allocate_port_blocking_task, PortError};
use super::session::ValidatedLogin;
use super::token_store::{StoreError, TokenStore};
use crate::services::identity::{validated_display_name, IdentityProvider};
use crate::services::BrowserLauncher;
use exmeta_common::api::ApiRoutes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Failures that end a login attempt before a token can arrive
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Callback listener failed: {0}")]
    Callback(#[from] CallbackError),

    #[error("Could not open the browser: {0}")]
    Browser(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a login attempt ended
#[derive(Debug)]
pub enum LoginResult {
    /// Token received, stored and accepted by the display-name lookup
    Validated(ValidatedLogin),
    /// Timeout, abandoned browser flow, or a callback without a token
    NoToken,
    /// Token received but rejected; it has been removed from the store
    ValidationFailed,
    Failed(AuthError),
}

/// Messages a running login task posts back to the session owner
#[derive(Debug)]
pub enum AuthEvent {
    /// The callback listener is bound; the browser is opened next
    ListenerReady { attempt: u64, port: u16 },
    LoginFinished { attempt: u64, result: LoginResult },
}

/// Everything a login task needs, detached from the session owner
#[derive(Clone)]
pub struct LoginFlow {
    pub routes: ApiRoutes,
    pub store: Arc<dyn TokenStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub start_port: u16,
    pub callback_timeout: Duration,
}

impl LoginFlow {
    /// Run one attempt and post its events
    ///
    /// `cached_port` is tried first; if it is taken a fresh port is
    /// allocated from `start_port`.
    pub async fn run(
        self,
        attempt: u64,
        cached_port: Option<u16>,
        events: mpsc::UnboundedSender<AuthEvent>,
    ) {
        let result = match self.bind_listener(cached_port).await {
            Ok(listener) => {
                let port = listener.port();
                let _ = events.send(AuthEvent::ListenerReady { attempt, port });
                self.complete(listener).await
            }
            Err(e) => LoginResult::Failed(e),
        };

        let _ = events.send(AuthEvent::LoginFinished { attempt, result });
    }

    async fn bind_listener(&self, cached_port: Option<u16>) -> Result<CallbackListener, AuthError> {
        if let Some(port) = cached_port {
            match CallbackListener::bind(port).await {
                Ok(listener) => return Ok(listener),
                Err(e) if e.is_addr_in_use() => {
                    debug!(port, "Cached callback port is taken, allocating a new one");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let port = allocate_port_blocking_task(self.start_port).await?;
        Ok(CallbackListener::bind(port).await?)
    }

    async fn complete(&self, listener: CallbackListener) -> LoginResult {
        let url = self.routes.login_url(listener.port());
        if let Err(e) = self.browser.open(&url) {
            warn!(error = %e, "Browser launch failed");
            return LoginResult::Failed(AuthError::Browser(e.to_string()));
        }

        let token = listener.await_token(self.callback_timeout).await;
        if token.is_empty() {
            return LoginResult::NoToken;
        }

        if let Err(e) = self.store.save(Some(&token)) {
            warn!(error = %e, "Could not persist login token");
            return LoginResult::Failed(e.into());
        }

        match validated_display_name(self.identity.as_ref(), &token).await {
            Some(display_name) => {
                info!(display_name = %display_name, "Login validated");
                LoginResult::Validated(ValidatedLogin::new(token, display_name))
            }
            None => {
                info!("Login token rejected by display-name lookup");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Could not discard rejected token");
                }
                LoginResult::ValidationFailed
            }
        }
    }
}
