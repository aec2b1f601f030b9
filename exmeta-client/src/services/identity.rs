//! Display-name lookup used to validate a bearer token

use super::api_client::ApiError;
use async_trait::async_trait;

/// Resolves the signed-in user's display name for a token
///
/// A token is considered valid exactly when this returns a non-blank name.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the server does not accept the token
    async fn fetch_display_name(&self, token: &str) -> Result<Option<String>, ApiError>;
}

/// Run the lookup and collapse every failure into `None`
pub async fn validated_display_name(
    identity: &dyn IdentityProvider,
    token: &str,
) -> Option<String> {
    match identity.fetch_display_name(token).await {
        Ok(Some(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Display name lookup failed");
            None
        }
    }
}
