//! Batch upload: re-entrancy guard, error taxonomy and the delivery task

use super::pending::PendingItem;
use super::wire::{serialize_batch, ItemSerializer};
use crate::auth::{AuthGate, TokenStore, ValidatedLogin};
use crate::services::{ApiError, RemoteApi, UploadResponse};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Upload failures surfaced to the caller of `send_all`
///
/// In every case the pending batch is left intact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("An upload is already in progress")]
    AlreadyInFlight,

    #[error("No file metadata to send. Please select a file first.")]
    EmptyBatch,

    #[error("Authentication failed; cannot send.")]
    AuthenticationFailed,

    #[error("No valid token after login attempt.")]
    TokenMissing,

    #[error("Could not serialize metadata: {0}")]
    Serialization(String),

    #[error("Failed to send metadata. Status: {status}\n{body}")]
    RemoteRejected { status: u16, body: String },

    #[error("Error sending metadata: {message}")]
    NetworkError { message: String },

    #[error("Upload task was interrupted")]
    Interrupted,
}

impl UploadError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::RemoteRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pending-batch mutation refusals
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("The selection cannot change while an upload is in progress")]
    UploadInFlight,
}

/// Single mutual-exclusion flag for the upload path
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadState {
    in_flight: bool,
}

impl UploadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Set the flag; refuses when it is already set
    pub fn begin(&mut self) -> Result<(), UploadError> {
        if self.in_flight {
            return Err(UploadError::AlreadyInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Refuse batch mutations while an upload is running
    pub fn check_mutable(&self) -> Result<(), BatchError> {
        if self.in_flight {
            Err(BatchError::UploadInFlight)
        } else {
            Ok(())
        }
    }
}

/// Posts a serialized batch
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn post_batch(&self, token: &str, body: String) -> Result<UploadResponse, ApiError>;
}

#[async_trait]
impl BatchTransport for RemoteApi {
    async fn post_batch(&self, token: &str, body: String) -> Result<UploadResponse, ApiError> {
        self.upload_batch(token, body).await
    }
}

/// Result of one delivery, handed back to the batch owner
#[derive(Debug)]
pub struct Delivery {
    /// Session established while waiting on the gate, to be adopted
    pub validated: Option<ValidatedLogin>,
    /// Number of items accepted by the server
    pub result: Result<usize, UploadError>,
}

impl Delivery {
    fn failed(validated: Option<ValidatedLogin>, error: UploadError) -> Self {
        Self {
            validated,
            result: Err(error),
        }
    }
}

/// Runs the network side of `send_all` off the owning task
///
/// Holds no batch state: it receives a snapshot of the items and reports
/// a [`Delivery`]; clearing the batch and the in-flight flag is the
/// owner's job.
#[derive(Clone)]
pub struct BatchUploader {
    transport: Arc<dyn BatchTransport>,
    serializer: Arc<dyn ItemSerializer>,
    store: Arc<dyn TokenStore>,
}

impl BatchUploader {
    pub fn new(
        transport: Arc<dyn BatchTransport>,
        serializer: Arc<dyn ItemSerializer>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            transport,
            serializer,
            store,
        }
    }

    pub async fn deliver(&self, gate: AuthGate, items: Vec<PendingItem>) -> Delivery {
        let validated = match gate {
            AuthGate::Ready => None,
            AuthGate::Waiting(waiter) => match waiter.wait().await {
                Some(login) => Some(login),
                None => return Delivery::failed(None, UploadError::AuthenticationFailed),
            },
        };

        if items.is_empty() {
            return Delivery::failed(validated, UploadError::EmptyBatch);
        }

        let token = match self.store.get() {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Delivery::failed(validated, UploadError::TokenMissing),
            Err(e) => {
                warn!(error = %e, "Token store read failed before upload");
                return Delivery::failed(validated, UploadError::TokenMissing);
            }
        };

        let body = match serialize_batch(self.serializer.as_ref(), &items) {
            Ok(body) => body,
            Err(e) => return Delivery::failed(validated, UploadError::Serialization(e.to_string())),
        };

        let count = items.len();
        info!(count, bytes = body.len(), "Uploading metadata batch");

        let result = match self.transport.post_batch(&token, body).await {
            Ok(response) if response.is_success() => {
                info!(count, status = response.status, "Batch accepted");
                Ok(count)
            }
            Ok(response) => {
                warn!(status = response.status, "Batch rejected by server");
                Err(UploadError::RemoteRejected {
                    status: response.status,
                    body: response.body,
                })
            }
            Err(e) => {
                warn!(error = %e, "Batch upload failed");
                Err(UploadError::NetworkError {
                    message: e.to_string(),
                })
            }
        };

        Delivery { validated, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::batch::JsonItemSerializer;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        status: u16,
        bodies: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BatchTransport for RecordingTransport {
        async fn post_batch(&self, token: &str, body: String) -> Result<UploadResponse, ApiError> {
            self.bodies.lock().unwrap().push((token.to_string(), body));
            Ok(UploadResponse {
                status: self.status,
                body: "denied".to_string(),
            })
        }
    }

    fn uploader(transport: Arc<RecordingTransport>, token: Option<&str>) -> BatchUploader {
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::new(),
        };
        BatchUploader::new(transport, Arc::new(JsonItemSerializer), Arc::new(store))
    }

    fn items(n: usize) -> Vec<PendingItem> {
        (0..n)
            .map(|i| PendingItem::new(format!("{}.exe", i), json!({"i": i}), json!({})))
            .collect()
    }

    #[test]
    fn test_upload_state_guard() {
        let mut state = UploadState::new();
        assert!(state.check_mutable().is_ok());
        state.begin().unwrap();
        assert_eq!(state.begin(), Err(UploadError::AlreadyInFlight));
        assert_eq!(state.check_mutable(), Err(BatchError::UploadInFlight));
        state.finish();
        assert!(!state.is_in_flight());
    }

    #[tokio::test]
    async fn test_success_posts_once_with_bearer_token() {
        let transport = Arc::new(RecordingTransport {
            status: 200,
            ..Default::default()
        });
        let delivery = uploader(transport.clone(), Some("jwt"))
            .deliver(AuthGate::Ready, items(2))
            .await;

        assert_eq!(delivery.result, Ok(2));
        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, "jwt");
        assert!(bodies[0].1.starts_with("[{\"Metadata\""));
    }

    #[tokio::test]
    async fn test_rejection_keeps_status_and_body() {
        let transport = Arc::new(RecordingTransport {
            status: 401,
            ..Default::default()
        });
        let delivery = uploader(transport, Some("jwt"))
            .deliver(AuthGate::Ready, items(1))
            .await;

        let err = delivery.result.unwrap_err();
        assert_eq!(
            err,
            UploadError::RemoteRejected {
                status: 401,
                body: "denied".to_string()
            }
        );
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_missing_token_does_not_post() {
        let transport = Arc::new(RecordingTransport {
            status: 200,
            ..Default::default()
        });
        let delivery = uploader(transport.clone(), None)
            .deliver(AuthGate::Ready, items(1))
            .await;

        assert_eq!(delivery.result, Err(UploadError::TokenMissing));
        assert!(transport.bodies.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_message_matches_dialog_text() {
        let err = UploadError::RemoteRejected {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to send metadata. Status: 500\nboom");
    }
}
