//! Remote ExeMeta API client
//!
//! Wraps one `reqwest::Client` for the two bearer-authenticated endpoints:
//! display-name lookup and batch metadata upload.

use super::identity::IdentityProvider;
use async_trait::async_trait;
use exmeta_common::api::{ApiRoutes, DisplayNameResponse};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("ExeMetaDataExtractor/", env!("CARGO_PKG_VERSION"));
const DISPLAY_NAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote API client errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Raw outcome of an upload POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// ExeMeta API client
#[derive(Debug, Clone)]
pub struct RemoteApi {
    http_client: reqwest::Client,
    routes: ApiRoutes,
}

impl RemoteApi {
    pub fn new(routes: ApiRoutes) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            routes,
        })
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    /// Display name for `token`, `None` on any non-2xx answer
    pub async fn display_name(&self, token: &str) -> Result<Option<String>, ApiError> {
        let url = self.routes.display_name_url();
        tracing::debug!(url = %url, "Fetching user display name");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .timeout(DISPLAY_NAME_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Display name lookup rejected");
            return Ok(None);
        }

        let dto: DisplayNameResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(dto.display_name().map(str::to_string))
    }

    /// POST a pre-serialized JSON array to the batch upload endpoint
    ///
    /// Any HTTP answer is returned as-is; only transport failures are errors.
    pub async fn upload_batch(&self, token: &str, body: String) -> Result<UploadResponse, ApiError> {
        let url = self.routes.upload_batch_url();
        tracing::debug!(url = %url, bytes = body.len(), "Posting metadata batch");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(UploadResponse { status, body })
    }
}

#[async_trait]
impl IdentityProvider for RemoteApi {
    async fn fetch_display_name(&self, token: &str) -> Result<Option<String>, ApiError> {
        self.display_name(token).await
    }
}
