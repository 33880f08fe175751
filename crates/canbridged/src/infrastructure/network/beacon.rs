//! UDP discovery beacon publisher.
//!
//! Every [`BEACON_INTERVAL`] the daemon broadcasts one datagram on the
//! LAN so clients can discover it and the buses it serves; the payload is
//! built by [`canbridge_core::build_beacon`].  The publisher runs as a
//! blocking loop on a dedicated thread to keep synchronous socket I/O off
//! the Tokio runtime, and shares nothing mutable with the sessions – only
//! the immutable configured bus list.
//!
//! A setup failure is not fatal to the daemon: discovery degrades to
//! manual configuration while the TCP service keeps running.

use std::net::UdpSocket;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use canbridge_core::build_beacon;
use thiserror::Error;
use tracing::{info, warn};

/// Interval between beacon datagrams.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(3);

/// Error type for beacon publisher setup.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// The UDP socket could not be created or configured for broadcast.
    #[error("failed to set up beacon socket: {0}")]
    Setup(#[source] std::io::Error),
}

/// Binds the beacon socket and spawns the background broadcast thread.
///
/// `service_port` is the TCP port advertised in the payload;
/// `broadcast_port` is the UDP destination port.  The thread runs until
/// `running` is cleared.
///
/// # Errors
///
/// Returns [`BeaconError::Setup`] if the socket cannot be prepared; the
/// caller logs this and continues without discovery.
pub fn start_beacon_publisher(
    service_port: u16,
    broadcast_port: u16,
    buses: Arc<Vec<String>>,
    running: Arc<AtomicBool>,
) -> Result<(), BeaconError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(BeaconError::Setup)?;
    socket.set_broadcast(true).map_err(BeaconError::Setup)?;

    std::thread::Builder::new()
        .name("beacon".to_string())
        .spawn(move || beacon_loop(socket, service_port, broadcast_port, buses, running))
        .map_err(BeaconError::Setup)?;

    info!("beacon publisher started (UDP {broadcast_port}, every {BEACON_INTERVAL:?})");
    Ok(())
}

/// The broadcast loop executed on the beacon thread.
fn beacon_loop(
    socket: UdpSocket,
    service_port: u16,
    broadcast_port: u16,
    buses: Arc<Vec<String>>,
    running: Arc<AtomicBool>,
) {
    let hostname = hostname();

    while running.load(Ordering::Relaxed) {
        let payload = build_beacon(&hostname, service_port, &buses);
        if let Err(e) = socket.send_to(payload.as_bytes(), ("255.255.255.255", broadcast_port)) {
            // Transient (network down, no broadcast route): try again next tick.
            warn!("failed to send beacon: {e}");
        }
        std::thread::sleep(BEACON_INTERVAL);
    }

    info!("beacon publisher stopped");
}

/// The hostname advertised in the beacon.
fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }

    #[test]
    fn test_start_beacon_publisher_binds_and_spawns() {
        // running=false stops the thread after at most one broadcast.
        let running = Arc::new(AtomicBool::new(false));
        let buses = Arc::new(vec!["vcan0".to_string()]);

        let result = start_beacon_publisher(28600, 0, buses, running);
        assert!(result.is_ok(), "binding an ephemeral UDP port must work");
    }

    #[test]
    fn test_beacon_datagram_is_receivable_on_loopback() {
        // Send one beacon directly (not via the thread) to a local receiver
        // to verify the datagram path end to end.
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("receiver bind");
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let dest = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").expect("sender bind");
        let payload = build_beacon("testhost", 28600, &["vcan0".to_string()]);
        sender.send_to(payload.as_bytes(), dest).expect("send");

        let mut buf = [0u8; 2048];
        let (n, _) = receiver.recv_from(&mut buf).expect("receive beacon");
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.starts_with("<CANBeacon name=\"testhost\""));
        assert!(text.contains("<Bus name=\"vcan0\"/>"));
    }
}
