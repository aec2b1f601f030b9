//! Loopback callback listener
//!
//! Receives the browser redirect `GET /?token=<value>` that completes the
//! web login, answers it with a fixed confirmation page, and yields the
//! token exactly once.
//!
//! # Resolution rules
//!
//! - Only the request line is parsed; it must start with `GET`.
//! - No `?`, no `token` key, or a malformed request line yields `""`.
//! - Every connection that sends a request gets the same 200 page.
//! - The first connection to finish parsing resolves the wait; other
//!   in-flight connections are dropped with the listener.
//! - Connections that close without sending a byte are not requests and
//!   do not resolve the wait (browser preconnects do this).
//! - The wait races a timeout; on expiry the result is `""`.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Maximum number of request bytes read from a callback connection
pub const CALLBACK_READ_LIMIT: usize = 1024;

/// Pause after a failed `accept` before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Page served to the browser once the redirect arrives
pub const CONFIRMATION_PAGE: &str = "<!doctype html><html><head><meta charset='utf-8'>\
<title>Login Successful</title></head><body>\
<script>try{history.replaceState(null,'','/');}catch(e){}</script>\
<h2>Login Successful</h2><p>You can close this window.</p></body></html>";

/// Callback listener errors
///
/// Timeouts and malformed requests are not errors; they yield an empty token.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Failed to bind callback listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

impl CallbackError {
    /// True when the port was taken between allocation and bind
    pub fn is_addr_in_use(&self) -> bool {
        match self {
            CallbackError::Bind { source, .. } => {
                source.kind() == std::io::ErrorKind::AddrInUse
            }
        }
    }
}

/// Extract the `token` query value from a raw HTTP request
///
/// # Examples
///
/// ```
/// use exmeta_client::auth::callback::extract_token;
///
/// assert_eq!(extract_token("GET /?token=abc123 HTTP/1.1\r\n\r\n"), "abc123");
/// assert_eq!(extract_token("GET / HTTP/1.1\r\n\r\n"), "");
/// assert_eq!(extract_token("GET /?foo=bar HTTP/1.1\r\n\r\n"), "");
/// ```
pub fn extract_token(request: &str) -> String {
    let request_line = request.lines().next().unwrap_or_default();
    if !request_line.starts_with("GET") {
        return String::new();
    }

    let Some(query_start) = request_line.find('?') else {
        return String::new();
    };
    let after_mark = &request_line[query_start + 1..];
    let query = match after_mark.find(' ') {
        Some(end) => &after_mark[..end],
        None => after_mark,
    };

    query_value(query, "token").unwrap_or_default()
}

/// First value of `key` in a URL-encoded query string, percent-decoded
fn query_value(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(name) == key).then(|| percent_decode(value))
        })
}

fn percent_decode(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes()))
            .into_owned(),
    }
}

/// Full HTTP response carrying [`CONFIRMATION_PAGE`]
pub fn confirmation_response() -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CONFIRMATION_PAGE.len(),
        CONFIRMATION_PAGE
    )
}

/// A bound loopback listener awaiting one login redirect
///
/// Dropping the value closes the socket; [`CallbackListener::await_token`]
/// consumes it so teardown happens on every exit path.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Bind `127.0.0.1:port`
    pub async fn bind(port: u16) -> Result<Self, CallbackError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CallbackError::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(port);

        debug!(port, "Callback listener bound");
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the first callback or the timeout, whichever comes first
    ///
    /// Returns the extracted token, or `""` on timeout or a request without
    /// a token. The listener is closed before this returns.
    pub async fn await_token(self, timeout: Duration) -> String {
        let port = self.port;
        let outcome = tokio::time::timeout(timeout, accept_first(&self.listener)).await;

        match outcome {
            Ok(token) => {
                info!(port, has_token = !token.is_empty(), "Login callback received");
                token
            }
            Err(_) => {
                info!(port, timeout_ms = timeout.as_millis() as u64, "Login callback timed out");
                String::new()
            }
        }
    }
}

/// Source of incoming callback connections
#[async_trait]
trait ConnectionSource: Send + Sync {
    async fn next_connection(&self) -> std::io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl ConnectionSource for TcpListener {
    async fn next_connection(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.accept().await
    }
}

/// Serve connections until one yields a token
///
/// A failed accept (e.g. file-descriptor exhaustion) pauses the loop for
/// [`ACCEPT_RETRY_DELAY`] before the next attempt.
async fn accept_first(source: &dyn ConnectionSource) -> String {
    let mut handlers: JoinSet<Option<String>> = JoinSet::new();

    loop {
        tokio::select! {
            accepted = source.next_connection() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Callback connection accepted");
                    handlers.spawn(serve_connection(stream));
                }
                Err(e) => {
                    warn!(error = %e, "Callback accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => match joined {
                Ok(Some(token)) => return token,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Callback connection handler failed"),
            },
        }
    }
}

/// Bind `port`, wait up to `timeout`, return the token (`""` when none)
pub async fn await_callback(port: u16, timeout: Duration) -> Result<String, CallbackError> {
    let listener = CallbackListener::bind(port).await?;
    Ok(listener.await_token(timeout).await)
}

/// Read the request prefix, answer with the confirmation page
///
/// Returns `None` when the peer closed without sending anything.
async fn serve_connection(mut stream: TcpStream) -> Option<String> {
    let mut buffer = vec![0u8; CALLBACK_READ_LIMIT];
    let mut filled = 0;

    while filled < CALLBACK_READ_LIMIT {
        match stream.read(&mut buffer[filled..]).await {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                if buffer[..filled].windows(2).any(|w| w == b"\r\n") {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Callback read failed");
                break;
            }
        }
    }

    if filled == 0 {
        debug!("Callback connection closed without a request");
        return None;
    }

    let request = String::from_utf8_lossy(&buffer[..filled]);
    let token = extract_token(&request);

    if let Err(e) = stream.write_all(confirmation_response().as_bytes()).await {
        debug!(error = %e, "Failed to write confirmation page");
    }
    let _ = stream.shutdown().await;

    Some(token)
}
