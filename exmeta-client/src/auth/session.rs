//! Authentication session value

use std::fmt;

/// A token together with the display name that validated it
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedLogin {
    pub token: String,
    pub display_name: String,
}

impl ValidatedLogin {
    pub fn new(token: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Debug for ValidatedLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedLogin")
            .field("token", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Current session
///
/// Authenticated exactly when both a token and a non-empty display name
/// are present; there is no separate flag to drift out of sync.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    token: Option<String>,
    display_name: Option<String>,
}

impl AuthSession {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn from_validated(login: ValidatedLogin) -> Self {
        let display_name = Some(login.display_name.trim().to_string()).filter(|n| !n.is_empty());
        let token = Some(login.token).filter(|t| !t.is_empty());
        Self {
            token,
            display_name,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.display_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        if self.is_authenticated() {
            self.display_name.as_deref()
        } else {
            None
        }
    }

    /// Status text shown next to the login controls
    pub fn status_line(&self) -> String {
        match self.display_name() {
            Some(name) => format!("Authenticated as: {}", name),
            None => "Not authenticated".to_string(),
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("display_name", &self.display_name)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
