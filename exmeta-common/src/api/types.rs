//! Shared API request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response body of `GET /api/auth/get-user-display-name`
///
/// # Examples
///
/// ```
/// use exmeta_common::api::DisplayNameResponse;
///
/// let dto: DisplayNameResponse = serde_json::from_str(r#"{"displayName":"Ada"}"#).unwrap();
/// assert_eq!(dto.display_name(), Some("Ada"));
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNameResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl DisplayNameResponse {
    /// Display name, treating blank values as absent
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Per-item upload payload; one element of the batch array
///
/// Field names follow the server's record shape (`Metadata`, `CustomData`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadMetadataRequest<'a> {
    pub metadata: &'a Value,
    pub custom_data: &'a Value,
}
