//! Shared fixtures for exmeta-client integration tests
//!
//! - `MockApi`: axum server standing in for the ExeMeta service
//! - `RedirectingBrowser`: plays the browser side of the login redirect

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use exmeta_client::auth::{AuthServices, AuthSettings, MemoryTokenStore, TokenStore};
use exmeta_client::batch::JsonItemSerializer;
use exmeta_client::intake::UnsupportedShortcuts;
use exmeta_client::services::{BrowserLauncher, FileFactsExtractor, RemoteApi};
use exmeta_client::ControllerServices;
use exmeta_common::api::ApiRoutes;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;

/// Token the mock display-name endpoint accepts
pub const GOOD_TOKEN: &str = "good-token";
pub const DISPLAY_NAME: &str = "Ada Lovelace";

/// Observable state of the mock ExeMeta service
pub struct MockState {
    pub upload_status: AtomicU16,
    pub upload_body: Mutex<String>,
    /// `(authorization header, body)` of every upload received
    pub uploads: Mutex<Vec<(String, String)>>,
    pub hold_uploads: AtomicBool,
    pub upload_received: Notify,
    pub release_upload: Notify,
}

impl MockState {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockApi {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            upload_status: AtomicU16::new(200),
            upload_body: Mutex::new(String::new()),
            uploads: Mutex::new(Vec::new()),
            hold_uploads: AtomicBool::new(false),
            upload_received: Notify::new(),
            release_upload: Notify::new(),
        });

        let app = Router::new()
            .route("/api/auth/get-user-display-name", get(display_name))
            .route("/api/exe-lookup/upload-metadata-batch", post(upload))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn routes(&self) -> ApiRoutes {
        ApiRoutes::new(format!("http://{}", self.addr))
    }

    pub fn api(&self) -> Arc<RemoteApi> {
        Arc::new(RemoteApi::new(self.routes()).unwrap())
    }

    pub fn reject_uploads(&self, status: u16, body: &str) {
        self.state.upload_status.store(status, Ordering::SeqCst);
        *self.state.upload_body.lock().unwrap() = body.to_string();
    }
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn display_name(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if bearer(&headers) == format!("Bearer {}", GOOD_TOKEN) {
        (StatusCode::OK, Json(json!({ "displayName": DISPLAY_NAME })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({})))
    }
}

async fn upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.uploads.lock().unwrap().push((bearer(&headers), body));
    state.upload_received.notify_one();

    if state.hold_uploads.load(Ordering::SeqCst) {
        state.release_upload.notified().await;
    }

    let status = StatusCode::from_u16(state.upload_status.load(Ordering::SeqCst)).unwrap();
    let body = state.upload_body.lock().unwrap().clone();
    (status, body)
}

/// Browser stand-in that immediately performs the loopback redirect
///
/// `request_target` is sent as the request target, e.g. `/?token=abc`.
pub struct RedirectingBrowser {
    request_target: Option<String>,
    pub opened: Mutex<Vec<String>>,
    pub pages: Arc<Mutex<Vec<String>>>,
}

impl RedirectingBrowser {
    pub fn with_target(target: &str) -> Self {
        Self {
            request_target: Some(target.to_string()),
            opened: Mutex::new(Vec::new()),
            pages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Opens nothing and never redirects
    pub fn idle() -> Self {
        Self {
            request_target: None,
            opened: Mutex::new(Vec::new()),
            pages: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Loopback port carried in the login URL's `returnUrl`
pub fn return_port(login_url: &str) -> u16 {
    let encoded = login_url.split("returnUrl=").nth(1).unwrap();
    let decoded = urlencoding::decode(encoded).unwrap();
    decoded.rsplit(':').next().unwrap().parse().unwrap()
}

impl BrowserLauncher for RedirectingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());

        if let Some(target) = self.request_target.clone() {
            let port = return_port(url);
            let pages = self.pages.clone();
            tokio::spawn(async move {
                let page = send_raw_request(port, &format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target)).await;
                pages.lock().unwrap().push(page);
            });
        }
        Ok(())
    }
}

/// Write `request` to the loopback port and read the full response
pub async fn send_raw_request(port: u16, request: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    let _ = stream.read_to_string(&mut response).await;
    response
}

/// Settings pointing at the mock server; port 0 lets the OS pick
pub fn test_settings(routes: ApiRoutes) -> AuthSettings {
    AuthSettings {
        routes,
        callback_start_port: 0,
        callback_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
        poll_budget: Duration::from_secs(5),
    }
}

pub fn test_services(
    api: &MockApi,
    store: Arc<MemoryTokenStore>,
    browser: Arc<dyn BrowserLauncher>,
) -> ControllerServices {
    let remote = api.api();
    let store: Arc<dyn TokenStore> = store;
    ControllerServices {
        auth: AuthServices {
            store,
            identity: remote.clone(),
            browser,
        },
        transport: remote,
        serializer: Arc::new(JsonItemSerializer),
        extractor: Arc::new(FileFactsExtractor),
        shortcuts: Arc::new(UnsupportedShortcuts),
    }
}

/// Write a small fake executable into `dir`
pub fn write_exe(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"MZ\x90\x00fake executable").unwrap();
    path
}
