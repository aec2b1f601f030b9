//! Event types for the ExeMeta client
//!
//! The controller publishes every observable state change on the EventBus;
//! front ends (CLI, GUI shells) subscribe and render.

mod session_types;

pub use session_types::{AuthState, LoginFailure};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Client event types
///
/// Serialized with an internal `type` tag so shells can forward them as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Authentication state changed
    SessionChanged {
        state: AuthState,
        /// Cached display name (present only when authenticated)
        display_name: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A login attempt ended without a session
    LoginFailed {
        reason: LoginFailure,
        timestamp: DateTime<Utc>,
    },

    /// Pending batch contents changed
    BatchChanged {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Batch upload began (re-entrancy flag set)
    UploadStarted {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Remote accepted the batch; the batch has been cleared
    UploadSucceeded {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Upload failed; the batch is intact for retry
    UploadFailed {
        /// HTTP status when the server answered
        status: Option<u16>,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// File-selection state was reset
    SelectionReset { timestamp: DateTime<Utc> },
}

impl ClientEvent {
    pub fn session_changed(state: AuthState, display_name: Option<String>) -> Self {
        ClientEvent::SessionChanged {
            state,
            display_name,
            timestamp: Utc::now(),
        }
    }

    pub fn login_failed(reason: LoginFailure) -> Self {
        ClientEvent::LoginFailed {
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn batch_changed(count: usize) -> Self {
        ClientEvent::BatchChanged {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn upload_started(count: usize) -> Self {
        ClientEvent::UploadStarted {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn upload_succeeded(count: usize) -> Self {
        ClientEvent::UploadSucceeded {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn upload_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientEvent::UploadFailed {
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn selection_reset() -> Self {
        ClientEvent::SelectionReset {
            timestamp: Utc::now(),
        }
    }

    /// Event name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionChanged { .. } => "SessionChanged",
            ClientEvent::LoginFailed { .. } => "LoginFailed",
            ClientEvent::BatchChanged { .. } => "BatchChanged",
            ClientEvent::UploadStarted { .. } => "UploadStarted",
            ClientEvent::UploadSucceeded { .. } => "UploadSucceeded",
            ClientEvent::UploadFailed { .. } => "UploadFailed",
            ClientEvent::SelectionReset { .. } => "SelectionReset",
        }
    }
}

/// Broadcast bus for client events
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use exmeta_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ClientEvent,
    ) -> Result<usize, broadcast::error::SendError<ClientEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
