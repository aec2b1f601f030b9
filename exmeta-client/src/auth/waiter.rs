//! Poll the token store until a login completes elsewhere
//!
//! The browser login finishes on its own task; whoever needs a session
//! (the upload path) waits here instead of on the listener, checking the
//! store at a fixed interval within a fixed budget.

use super::session::ValidatedLogin;
use super::token_store::TokenStore;
use crate::services::identity::{validated_display_name, IdentityProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of asking the session manager for a usable session
pub enum AuthGate {
    /// Already authenticated
    Ready,
    /// A login is running; wait on the enclosed poller
    Waiting(LoginWaiter),
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthGate::Ready => write!(f, "Ready"),
            AuthGate::Waiting(w) => write!(f, "Waiting({:?})", w.budget),
        }
    }
}

/// Detached token-store poller
pub struct LoginWaiter {
    store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityProvider>,
    interval: Duration,
    budget: Duration,
}

impl LoginWaiter {
    pub fn new(
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityProvider>,
        interval: Duration,
        budget: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            interval,
            budget,
        }
    }

    /// Poll every `interval` until a stored token validates or `budget` runs out
    ///
    /// The first check happens after one interval; the last one happens
    /// when the full budget has elapsed.
    pub async fn wait(self) -> Option<ValidatedLogin> {
        let mut waited = Duration::ZERO;

        while waited < self.budget {
            tokio::time::sleep(self.interval).await;
            waited += self.interval;

            let token = match self.store.get() {
                Ok(Some(token)) if !token.is_empty() => token,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "Token store read failed while waiting for login");
                    continue;
                }
            };

            if let Some(name) = validated_display_name(self.identity.as_ref(), &token).await {
                info!(waited_ms = waited.as_millis() as u64, "Login detected while waiting");
                return Some(ValidatedLogin::new(token, name));
            }
        }

        info!(budget_ms = self.budget.as_millis() as u64, "Gave up waiting for login");
        None
    }
}
