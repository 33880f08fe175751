//! CANBridge daemon entry point.
//!
//! Wires together the beacon publisher, the TCP session supervisor, and
//! the shutdown handler, then runs the Tokio async runtime until the
//! listener stops.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::parse() + DaemonConfig      -- flags, env vars, optional TOML file
//!  └─ start services
//!       ├─ BeaconPublisher     (UDP background thread, every 3 s)
//!       ├─ Ctrl-C handler      (clears the shared running flag)
//!       └─ run_server          (TCP accept loop; one task per session)
//! ```
//!
//! Each accepted client gets its own session task and its own
//! broadcast-manager socket; the only state shared across them is the
//! immutable configuration.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use canbridged::infrastructure::network::{self, beacon};
use canbridged::infrastructure::storage::config::DaemonConfig;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// CAN-over-TCP gateway daemon.
///
/// Exposes the host's SocketCAN buses to remote clients through an ASCII
/// line protocol and advertises itself with a periodic UDP beacon.
#[derive(Debug, Parser)]
#[command(
    name = "canbridged",
    about = "CAN-over-TCP gateway daemon for SocketCAN hosts",
    version
)]
struct Cli {
    /// Comma-separated CAN interfaces to serve and advertise, e.g. `can0,vcan1`.
    #[arg(
        short,
        long,
        value_delimiter = ',',
        env = "CANBRIDGE_INTERFACES",
        value_name = "IF,IF,..."
    )]
    interfaces: Vec<String>,

    /// TCP port clients connect to.
    #[arg(long, env = "CANBRIDGE_PORT")]
    port: Option<u16>,

    /// UDP port the discovery beacon is broadcast to.
    #[arg(long, env = "CANBRIDGE_BROADCAST_PORT")]
    broadcast_port: Option<u16>,

    /// Address to bind the TCP listener.
    #[arg(long, env = "CANBRIDGE_BIND")]
    bind: Option<std::net::IpAddr>,

    /// Log every received frame.
    #[arg(short, long)]
    verbose: bool,

    /// Optional TOML configuration file; command-line flags override it.
    #[arg(long, env = "CANBRIDGE_CONFIG", value_name = "PATH")]
    config: Option<std::path::PathBuf>,
}

impl Cli {
    /// Merges the optional config file with the command-line overrides.
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::load(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => DaemonConfig::default(),
        };

        if !self.interfaces.is_empty() {
            config.interfaces = self.interfaces;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(port) = self.broadcast_port {
            config.broadcast_port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if self.verbose {
            config.verbose = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    if config.interfaces.is_empty() {
        warn!("no CAN interfaces configured; the beacon will advertise none (see --interfaces)");
    }
    info!(
        "canbridged starting: serving {:?} on TCP port {}",
        config.interfaces, config.port
    );

    // Shutdown flag shared across all background services.
    let running = Arc::new(AtomicBool::new(true));
    let buses = Arc::new(config.interfaces.clone());

    // ── Beacon publisher ──────────────────────────────────────────────────────
    // Discovery is best-effort: clients can still connect directly.
    if let Err(e) = beacon::start_beacon_publisher(
        config.port,
        config.broadcast_port,
        Arc::clone(&buses),
        Arc::clone(&running),
    ) {
        error!("beacon publisher failed to start: {e}");
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── TCP accept loop ───────────────────────────────────────────────────────
    network::run_server(Arc::new(config), running).await?;

    info!("canbridged stopped");
    Ok(())
}
