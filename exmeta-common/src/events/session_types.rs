//! Session and login types carried by client events

use serde::{Deserialize, Serialize};

/// Authentication state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    /// No valid session; the token store is empty
    LoggedOut,
    /// Browser handed off, waiting for the loopback callback
    LoggingIn,
    /// Token validated and display name cached
    Authenticated,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::LoggedOut => write!(f, "logged out"),
            AuthState::LoggingIn => write!(f, "logging in"),
            AuthState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Why a login attempt ended without a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum LoginFailure {
    /// Callback timed out, was malformed, or carried no token
    NoTokenReceived,
    /// Token arrived but the display-name lookup rejected it
    TokenRejected,
    /// Port allocation, listener bind, or browser launch failed
    Error(String),
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginFailure::NoTokenReceived => write!(f, "Login failed: No token received."),
            LoginFailure::TokenRejected => write!(f, "Login failed: token was not accepted."),
            LoginFailure::Error(msg) => write!(f, "Login failed: {}", msg),
        }
    }
}
