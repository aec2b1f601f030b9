//! Loopback port allocation
//!
//! Tries ports in ascending order by binding a transient listener on
//! 127.0.0.1. The test bind is dropped before returning, so the result is a
//! best-effort hint rather than a reservation: another process may take the
//! port before the callback listener binds it.

use std::net::{Ipv4Addr, TcpListener};
use thiserror::Error;
use tracing::{debug, warn};

/// Highest port considered by the scan (inclusive)
pub const MAX_CALLBACK_PORT: u16 = 65_534;

/// Port allocation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("No available loopback port in range {start}..={end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("Port search task failed: {0}")]
    SearchTask(String),
}

/// Find the first bindable loopback port at or above `start`
///
/// Blocking: must not run on the controller task. Use
/// [`allocate_port_blocking_task`] from async code.
pub fn allocate_port(start: u16) -> Result<u16, PortError> {
    for port in start..=MAX_CALLBACK_PORT {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(trial) => {
                drop(trial);
                debug!(port, "Allocated loopback port");
                return Ok(port);
            }
            Err(e) => {
                debug!(port, error = %e, "Port unavailable, trying next");
            }
        }
    }

    warn!(start, "No loopback port available");
    Err(PortError::NoAvailablePort {
        start,
        end: MAX_CALLBACK_PORT,
    })
}

/// Run [`allocate_port`] on the blocking thread pool
pub async fn allocate_port_blocking_task(start: u16) -> Result<u16, PortError> {
    tokio::task::spawn_blocking(move || allocate_port(start))
        .await
        .map_err(|e| PortError::SearchTask(e.to_string()))?
}
