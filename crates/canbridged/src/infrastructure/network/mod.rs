//! TCP listener and session supervisor.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener on the configured address.
//! 2. Accepting incoming client connections.
//! 3. Opening a private broadcast-manager channel for each connection.
//! 4. Spawning one isolated Tokio task per session, so a fault in one
//!    client's session never affects another session or the accept loop.
//! 5. Shutting down when the shared `running` flag is cleared.
//!
//! # Scalability
//!
//! The accept loop never blocks on a session: it accepts a connection and
//! immediately spawns a task for it before accepting the next one.  Tokio's
//! multi-threaded runtime distributes the session tasks across OS threads.

pub mod beacon;

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info};

use crate::application::session::Session;
use crate::infrastructure::bus::BcmChannel;
use crate::infrastructure::storage::config::DaemonConfig;

/// Error type for the listener setup.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The TCP listener could not be bound.
    #[error("failed to bind TCP listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the accept loop until `running` is set to `false`.
///
/// # Errors
///
/// Returns [`NetworkError::BindFailed`] if the listener cannot be bound
/// (port in use, missing permission); this is fatal to the daemon.
pub async fn run_server(
    config: Arc<DaemonConfig>,
    running: Arc<AtomicBool>,
) -> Result<(), NetworkError> {
    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| NetworkError::BindFailed { addr, source })?;

    info!("listening for clients on {addr}");

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on accept() lets the loop poll the running flag
        // even when no clients are connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("client connected from {peer}");
                let verbose = config.verbose;
                tokio::spawn(async move {
                    handle_client(stream, peer, verbose).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. fd exhaustion): keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout – loop back to check the running flag.
            }
        }
    }

    Ok(())
}

/// Entry point of each per-session task: pairs the client stream with a
/// fresh broadcast-manager channel and runs the session to completion.
async fn handle_client(stream: TcpStream, peer: SocketAddr, verbose: bool) {
    let channel = match BcmChannel::open() {
        Ok(channel) => channel,
        Err(e) => {
            error!("could not open bus channel for {peer}: {e}");
            return;
        }
    };

    let end = Session::new(stream, channel, peer.to_string(), verbose)
        .run()
        .await;
    info!("client {peer} gone ({end})");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(port: u16) -> Arc<DaemonConfig> {
        Arc::new(DaemonConfig {
            port,
            ..DaemonConfig::default()
        })
    }

    #[tokio::test]
    async fn test_run_server_exits_when_running_is_cleared() {
        // Port 0 lets the OS choose a free port.
        let running = Arc::new(AtomicBool::new(false));
        let result = run_server(test_config(0), running).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_server_reports_bind_failure() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind");
        let port = probe.local_addr().unwrap().port();

        let config = Arc::new(DaemonConfig {
            port,
            bind_address: "127.0.0.1".parse().unwrap(),
            ..DaemonConfig::default()
        });
        let running = Arc::new(AtomicBool::new(true));

        // The probe still owns the port, so binding must fail.
        let result = run_server(config, running).await;
        assert!(matches!(result, Err(NetworkError::BindFailed { .. })));
    }
}
