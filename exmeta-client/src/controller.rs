//! Single-writer application controller
//!
//! One task owns the session manager, the pending batch and the upload
//! flag. Front ends talk to it through a [`ControllerHandle`]; background
//! work (login, intake, upload) runs on other tasks and hands its result
//! back here before any shared state changes. Every observable change is
//! published on the [`EventBus`].

use crate::auth::{AuthEvent, AuthServices, AuthSessionManager, AuthSettings, LoginReport, LoginStart};
use crate::batch::{
    BatchTransport, BatchUploader, Delivery, ItemSerializer, PendingBatch, PendingItem,
    UploadError, UploadState,
};
use crate::error::{ClientError, ClientResult};
use crate::intake::{intake_file, IntakeError, MetadataExtractor, ShortcutResolver};
use exmeta_common::events::{AuthState, ClientEvent, EventBus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Whether a send can start, with the hint a UI shows next to the button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SendReadiness {
    Ready,
    NeedsLoginAndFile,
    NeedsLogin,
    NeedsFile,
    Uploading,
}

impl SendReadiness {
    pub fn evaluate(authenticated: bool, has_files: bool, uploading: bool) -> Self {
        match (uploading, authenticated, has_files) {
            (true, _, _) => SendReadiness::Uploading,
            (false, true, true) => SendReadiness::Ready,
            (false, false, false) => SendReadiness::NeedsLoginAndFile,
            (false, false, true) => SendReadiness::NeedsLogin,
            (false, true, false) => SendReadiness::NeedsFile,
        }
    }

    pub fn can_send(&self) -> bool {
        matches!(self, SendReadiness::Ready)
    }

    pub fn hint(&self) -> &'static str {
        match self {
            SendReadiness::Ready => "",
            SendReadiness::NeedsLoginAndFile => "Login and select a file to enable",
            SendReadiness::NeedsLogin => "Login to enable",
            SendReadiness::NeedsFile => "Select a file to enable",
            SendReadiness::Uploading => "Sending...",
        }
    }
}

/// Point-in-time view of controller state
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub auth_state: AuthState,
    pub display_name: Option<String>,
    pub status_line: String,
    pub pending: Vec<PathBuf>,
    /// File name of the first pending item
    pub current_file: Option<String>,
    pub uploading: bool,
    pub readiness: SendReadiness,
}

/// Requests accepted by the controller
#[derive(Debug)]
pub enum Command {
    Login {
        reply: oneshot::Sender<LoginStart>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    AddFile {
        path: PathBuf,
        reply: oneshot::Sender<ClientResult<usize>>,
    },
    RemoveFile {
        path: PathBuf,
        reply: oneshot::Sender<ClientResult<usize>>,
    },
    ResetSelection {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SendAll {
        reply: oneshot::Sender<ClientResult<usize>>,
    },
    Snapshot {
        reply: oneshot::Sender<ClientSnapshot>,
    },
    Shutdown,
}

/// Collaborators wired into the controller
#[derive(Clone)]
pub struct ControllerServices {
    pub auth: AuthServices,
    pub transport: Arc<dyn BatchTransport>,
    pub serializer: Arc<dyn ItemSerializer>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub shortcuts: Arc<dyn ShortcutResolver>,
}

/// Cloneable front-end handle
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl ControllerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_bus.subscribe()
    }

    pub async fn login(&self) -> ClientResult<LoginStart> {
        self.request(|reply| Command::Login { reply }).await
    }

    pub async fn logout(&self) -> ClientResult<()> {
        self.request(|reply| Command::Logout { reply }).await
    }

    /// Classify, extract and queue `path`; returns the new batch size
    pub async fn add_file(&self, path: impl Into<PathBuf>) -> ClientResult<usize> {
        let path = path.into();
        self.request(|reply| Command::AddFile { path, reply }).await?
    }

    /// Returns how many entries were removed
    pub async fn remove_file(&self, path: impl Into<PathBuf>) -> ClientResult<usize> {
        let path = path.into();
        self.request(|reply| Command::RemoveFile { path, reply }).await?
    }

    pub async fn reset_selection(&self) -> ClientResult<()> {
        self.request(|reply| Command::ResetSelection { reply }).await?
    }

    /// Upload the whole batch; returns the number of items sent
    pub async fn send_all(&self) -> ClientResult<usize> {
        self.request(|reply| Command::SendAll { reply }).await?
    }

    pub async fn snapshot(&self) -> ClientResult<ClientSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ClientResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ClientError::ControllerGone)?;
        response.await.map_err(|_| ClientError::ControllerGone)
    }
}

struct ItemReady {
    path: PathBuf,
    result: Result<PendingItem, IntakeError>,
    reply: oneshot::Sender<ClientResult<usize>>,
}

pub struct AppController {
    auth: AuthSessionManager,
    auth_events: mpsc::UnboundedReceiver<AuthEvent>,
    batch: PendingBatch,
    upload: UploadState,
    uploader: BatchUploader,
    extractor: Arc<dyn MetadataExtractor>,
    shortcuts: Arc<dyn ShortcutResolver>,
    event_bus: EventBus,
    commands: mpsc::Receiver<Command>,
    intakes: JoinSet<ItemReady>,
    uploads: JoinSet<Delivery>,
    upload_reply: Option<oneshot::Sender<ClientResult<usize>>>,
}

impl AppController {
    pub fn new(
        settings: AuthSettings,
        services: ControllerServices,
        event_bus: EventBus,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let uploader = BatchUploader::new(
            services.transport,
            services.serializer,
            services.auth.store.clone(),
        );
        let (auth, auth_events) = AuthSessionManager::new(settings, services.auth);

        let controller = Self {
            auth,
            auth_events,
            batch: PendingBatch::new(),
            upload: UploadState::new(),
            uploader,
            extractor: services.extractor,
            shortcuts: services.shortcuts,
            event_bus: event_bus.clone(),
            commands,
            intakes: JoinSet::new(),
            uploads: JoinSet::new(),
            upload_reply: None,
        };
        let handle = ControllerHandle {
            commands: commands_tx,
            event_bus,
        };
        (controller, handle)
    }

    /// Spawn the controller on the current runtime
    pub fn spawn(
        settings: AuthSettings,
        services: ControllerServices,
        event_bus: EventBus,
    ) -> (ControllerHandle, tokio::task::JoinHandle<()>) {
        let (controller, handle) = Self::new(settings, services, event_bus);
        (handle, tokio::spawn(controller.run()))
    }

    /// Revalidate any stored session, then serve commands until shutdown
    ///
    /// Returns when [`Command::Shutdown`] arrives or every handle is
    /// dropped. Running background work is aborted on exit.
    pub async fn run(mut self) {
        self.auth.revalidate().await;
        self.publish_session();
        info!(state = %self.auth.state(), "Controller ready");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.auth_events.recv() => self.on_auth_event(event),
                Some(joined) = self.intakes.join_next(), if !self.intakes.is_empty() => match joined {
                    Ok(ready) => self.on_item_ready(ready),
                    Err(e) => warn!(error = %e, "Intake task failed"),
                },
                Some(joined) = self.uploads.join_next(), if !self.uploads.is_empty() => {
                    let delivery = joined.unwrap_or_else(|e| {
                        warn!(error = %e, "Upload task ended abnormally");
                        Delivery {
                            validated: None,
                            result: Err(UploadError::Interrupted),
                        }
                    });
                    self.finish_upload(delivery);
                }
            }
        }

        self.uploads.abort_all();
        self.intakes.abort_all();
        self.auth.cancel_login();
        info!("Controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Login { reply } => {
                let started = self.auth.login();
                self.publish_session();
                let _ = reply.send(started);
            }
            Command::Logout { reply } => {
                self.auth.logout();
                self.publish_session();
                let _ = reply.send(());
            }
            Command::AddFile { path, reply } => self.start_intake(path, reply),
            Command::RemoveFile { path, reply } => {
                let result = self.upload.check_mutable().map_err(ClientError::from).map(|()| {
                    let removed = self.batch.remove(&path);
                    if removed > 0 {
                        debug!(path = %path.display(), removed, "Removed pending item");
                        self.event_bus
                            .emit_lossy(ClientEvent::batch_changed(self.batch.count()));
                    }
                    removed
                });
                let _ = reply.send(result);
            }
            Command::ResetSelection { reply } => {
                let result = self.upload.check_mutable().map_err(ClientError::from).map(|()| {
                    self.reset_selection();
                });
                let _ = reply.send(result);
            }
            Command::SendAll { reply } => self.start_upload(reply),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn start_intake(&mut self, path: PathBuf, reply: oneshot::Sender<ClientResult<usize>>) {
        if let Err(e) = self.upload.check_mutable() {
            let _ = reply.send(Err(e.into()));
            return;
        }

        let extractor = self.extractor.clone();
        let shortcuts = self.shortcuts.clone();
        self.intakes.spawn(async move {
            let candidate = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                intake_file(&candidate, shortcuts.as_ref(), extractor.as_ref())
            })
            .await
            .unwrap_or_else(|e| Err(IntakeError::Worker(e.to_string())));

            ItemReady {
                path,
                result,
                reply,
            }
        });
    }

    fn on_item_ready(&mut self, ready: ItemReady) {
        let ItemReady {
            path,
            result,
            reply,
        } = ready;

        let outcome = match result {
            Ok(item) => match self.upload.check_mutable() {
                Ok(()) => {
                    self.batch.add(item);
                    info!(path = %path.display(), count = self.batch.count(), "File queued");
                    self.event_bus
                        .emit_lossy(ClientEvent::batch_changed(self.batch.count()));
                    Ok(self.batch.count())
                }
                Err(e) => Err(e.into()),
            },
            Err(e) => {
                info!(path = %path.display(), reason = %e, "File refused");
                Err(e.into())
            }
        };
        let _ = reply.send(outcome);
    }

    fn start_upload(&mut self, reply: oneshot::Sender<ClientResult<usize>>) {
        if self.upload.is_in_flight() {
            debug!("Send requested while an upload is running");
            let _ = reply.send(Err(UploadError::AlreadyInFlight.into()));
            return;
        }
        if self.batch.is_empty() {
            let _ = reply.send(Err(UploadError::EmptyBatch.into()));
            return;
        }
        if let Err(e) = self.upload.begin() {
            let _ = reply.send(Err(e.into()));
            return;
        }

        let count = self.batch.count();
        self.event_bus.emit_lossy(ClientEvent::upload_started(count));

        let state_before = self.auth.state();
        let gate = self.auth.gate();
        if self.auth.state() != state_before {
            info!("You need to login before sending. Opening login window...");
            self.publish_session();
        }

        let uploader = self.uploader.clone();
        let items = self.batch.items().to_vec();
        self.uploads
            .spawn(async move { uploader.deliver(gate, items).await });
        self.upload_reply = Some(reply);
    }

    fn finish_upload(&mut self, delivery: Delivery) {
        if let Some(login) = delivery.validated {
            self.auth.apply_validated(login);
            self.publish_session();
        }

        self.upload.finish();

        match &delivery.result {
            Ok(count) => {
                info!(count, "Metadata sent successfully");
                self.event_bus
                    .emit_lossy(ClientEvent::upload_succeeded(*count));
                self.reset_selection();
            }
            Err(e) => {
                warn!(error = %e, pending = self.batch.count(), "Upload failed; batch kept");
                self.event_bus
                    .emit_lossy(ClientEvent::upload_failed(e.status(), e.to_string()));
            }
        }

        if let Some(reply) = self.upload_reply.take() {
            let _ = reply.send(delivery.result.map_err(ClientError::from));
        }
    }

    fn on_auth_event(&mut self, event: AuthEvent) {
        match self.auth.handle_event(event) {
            LoginReport::Ignored => {}
            LoginReport::WaitingForBrowser { port } => {
                debug!(port, "Waiting for browser login");
            }
            LoginReport::Authenticated { display_name } => {
                info!(display_name = %display_name, "Login complete");
                self.publish_session();
            }
            LoginReport::Failed(reason) => {
                info!(reason = %reason, "Login did not complete");
                self.event_bus.emit_lossy(ClientEvent::login_failed(reason));
                self.publish_session();
            }
        }
    }

    fn reset_selection(&mut self) {
        self.batch.clear();
        self.event_bus.emit_lossy(ClientEvent::selection_reset());
        self.event_bus.emit_lossy(ClientEvent::batch_changed(0));
    }

    fn publish_session(&self) {
        let session = self.auth.session();
        self.event_bus.emit_lossy(ClientEvent::session_changed(
            self.auth.state(),
            session.display_name().map(str::to_string),
        ));
    }

    fn snapshot(&self) -> ClientSnapshot {
        let session = self.auth.session();
        let uploading = self.upload.is_in_flight();
        ClientSnapshot {
            auth_state: self.auth.state(),
            display_name: session.display_name().map(str::to_string),
            status_line: session.status_line(),
            pending: self.batch.paths(),
            current_file: self.batch.first().map(PendingItem::file_name),
            uploading,
            readiness: SendReadiness::evaluate(
                session.is_authenticated(),
                !self.batch.is_empty(),
                uploading,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_hints() {
        assert_eq!(
            SendReadiness::evaluate(false, false, false).hint(),
            "Login and select a file to enable"
        );
        assert_eq!(SendReadiness::evaluate(false, true, false).hint(), "Login to enable");
        assert_eq!(SendReadiness::evaluate(true, false, false).hint(), "Select a file to enable");
        assert!(SendReadiness::evaluate(true, true, false).can_send());
        assert_eq!(SendReadiness::evaluate(true, true, true), SendReadiness::Uploading);
    }
}
