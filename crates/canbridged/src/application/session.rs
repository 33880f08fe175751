//! Per-connection session: the dual-source event loop.
//!
//! Each accepted client gets one `Session`, which owns the client's duplex
//! byte stream, its private bus channel, and its framing state.  The loop
//! waits on two sources at once:
//!
//! - **a byte on the client stream** – fed to the framing layer; a
//!   completed frame is decoded and dispatched to the bus channel;
//! - **an event on the bus channel** – encoded and written back to the
//!   client, in delivery order, with no buffering across events.
//!
//! `tokio::select!` evaluates both waits in a single multiplexed poll, so
//! inbound commands and inbound bus traffic are serviced without one
//! starving the other.
//!
//! # Failure handling
//!
//! There is no error frame in the protocol, so nothing is ever echoed back
//! on failure.  Malformed frames and unresolvable bus names are logged at
//! debug level and dropped; the session continues.  An unrecognized
//! command character is the one protocol violation that terminates the
//! session (strict discipline kept for wire compatibility).  Transport
//! failures – client disconnect, read/write errors, a closed bus channel –
//! end only the owning session; the supervisor and all other sessions are
//! unaffected.

use std::fmt;

use canbridge_core::{decode_command, encode_event, FramingState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::infrastructure::bus::BusChannel;

/// Why a session ended.  Returned by [`Session::run`] for the supervisor's
/// closing log line and for integration tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection (zero-length read).
    ClientDisconnected,
    /// Reading from the client stream failed.
    ReadFailed,
    /// Writing an event to the client stream failed.
    WriteFailed,
    /// The client sent an unrecognized command character.
    ProtocolViolation,
    /// The bus channel stopped delivering events.
    BusChannelClosed,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionEnd::ClientDisconnected => "client disconnected",
            SessionEnd::ReadFailed => "client read failed",
            SessionEnd::WriteFailed => "client write failed",
            SessionEnd::ProtocolViolation => "protocol violation",
            SessionEnd::BusChannelClosed => "bus channel closed",
        };
        f.write_str(text)
    }
}

/// One client session.
///
/// Generic over the stream and the bus channel so tests can drive it with
/// [`tokio::io::duplex`] and the mock channel instead of real sockets.
pub struct Session<S, B> {
    stream: S,
    bus: B,
    framing: FramingState,
    peer: String,
    verbose: bool,
}

impl<S, B> Session<S, B>
where
    S: AsyncRead + AsyncWrite + Unpin,
    B: BusChannel,
{
    /// Creates a session over an established client stream and a private
    /// bus channel.  `peer` is a label for log lines only.
    pub fn new(stream: S, bus: B, peer: String, verbose: bool) -> Self {
        Self {
            stream,
            bus,
            framing: FramingState::new(),
            peer,
            verbose,
        }
    }

    /// Runs the session to completion and reports why it ended.
    pub async fn run(mut self) -> SessionEnd {
        let end = self.event_loop().await;
        info!(peer = %self.peer, "session closed: {end}");
        end
    }

    async fn event_loop(&mut self) -> SessionEnd {
        let mut byte = [0u8; 1];
        loop {
            tokio::select! {
                read = self.stream.read(&mut byte) => match read {
                    Ok(0) => return SessionEnd::ClientDisconnected,
                    Ok(_) => {
                        if let Some(frame) = self.framing.advance(byte[0]) {
                            if let Some(end) = self.handle_frame(&frame) {
                                return end;
                            }
                        }
                    }
                    Err(e) => {
                        debug!(peer = %self.peer, "client read error: {e}");
                        return SessionEnd::ReadFailed;
                    }
                },
                event = self.bus.next_event() => match event {
                    Ok(event) => {
                        let bytes = encode_event(&event);
                        if let Err(e) = self.stream.write_all(&bytes).await {
                            debug!(peer = %self.peer, "client write error: {e}");
                            return SessionEnd::WriteFailed;
                        }
                    }
                    Err(e) => {
                        debug!(peer = %self.peer, "bus channel error: {e}");
                        return SessionEnd::BusChannelClosed;
                    }
                },
            }
        }
    }

    /// Decodes and dispatches one complete frame.
    ///
    /// Returns `Some` only when the frame must terminate the session.
    fn handle_frame(&mut self, frame: &[u8]) -> Option<SessionEnd> {
        if self.verbose {
            info!(peer = %self.peer, "received {:?}", String::from_utf8_lossy(frame));
        }

        match decode_command(frame) {
            Ok(job) => {
                trace!(
                    peer = %self.peer,
                    bus = %job.bus,
                    command = %job.kind.command_char(),
                    id = job.frame.id(),
                    "submitting job"
                );
                if let Err(e) = self.bus.submit(&job) {
                    // No error frame exists in the protocol; the command
                    // vanishes just like a malformed frame does.
                    debug!(peer = %self.peer, "command dropped: {e}");
                }
                None
            }
            Err(e) if e.is_fatal() => {
                warn!(peer = %self.peer, "fatal protocol violation: {e}");
                Some(SessionEnd::ProtocolViolation)
            }
            Err(e) => {
                debug!(peer = %self.peer, "malformed frame dropped: {e}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::mock::MockBusChannel;
    use canbridge_core::{BusEvent, CanFrame, JobKind};
    use std::time::Duration;

    async fn wait_for_submissions(
        handle: &crate::infrastructure::bus::mock::MockBusHandle,
        count: usize,
    ) -> Vec<canbridge_core::BusJob> {
        for _ in 0..200 {
            let submitted = handle.submitted();
            if submitted.len() >= count {
                return submitted;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} submissions, got {:?}", handle.submitted());
    }

    #[tokio::test]
    async fn test_valid_command_is_submitted_to_the_bus_channel() {
        let (bus, handle) = MockBusChannel::new();
        let (mut client, server) = tokio::io::duplex(256);
        let task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        client.write_all(b"< vcan0 S 0 0 1A3 2 DE AD >").await.unwrap();

        let submitted = wait_for_submissions(&handle, 1).await;
        assert_eq!(submitted[0].kind, JobKind::SendOnce);
        assert_eq!(submitted[0].bus, "vcan0");
        assert_eq!(submitted[0].frame.data(), &[0xDE, 0xAD]);

        drop(client);
        assert_eq!(task.await.unwrap(), SessionEnd::ClientDisconnected);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_and_session_continues() {
        let (bus, handle) = MockBusChannel::new();
        let (mut client, server) = tokio::io::duplex(256);
        let task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        // Field count mismatch, then a valid frame.
        client.write_all(b"< vcan0 S 0 0 1A3 3 DE AD >").await.unwrap();
        client.write_all(b"< vcan0 D 0 0 123 0 >").await.unwrap();

        let submitted = wait_for_submissions(&handle, 1).await;
        assert_eq!(submitted.len(), 1, "only the valid frame reaches the bus");
        assert_eq!(submitted[0].kind, JobKind::DeleteCyclicSend);

        drop(client);
        assert_eq!(task.await.unwrap(), SessionEnd::ClientDisconnected);
    }

    #[tokio::test]
    async fn test_unknown_command_terminates_the_session() {
        let (bus, handle) = MockBusChannel::new();
        let (mut client, server) = tokio::io::duplex(256);
        let task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        client.write_all(b"< vcan0 Z 0 0 123 0 >").await.unwrap();

        assert_eq!(task.await.unwrap(), SessionEnd::ProtocolViolation);
        assert!(handle.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_bus_is_dropped_silently() {
        let (bus, handle) = MockBusChannel::rejecting("ghost0");
        let (mut client, server) = tokio::io::duplex(256);
        let task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        client.write_all(b"< ghost0 S 0 0 123 0 >").await.unwrap();
        client.write_all(b"< vcan0 S 0 0 123 0 >").await.unwrap();

        // The rejected command vanishes; the session lives on and the
        // next command goes through.
        let submitted = wait_for_submissions(&handle, 1).await;
        assert_eq!(submitted.last().unwrap().bus, "vcan0");

        drop(client);
        assert_eq!(task.await.unwrap(), SessionEnd::ClientDisconnected);
    }

    #[tokio::test]
    async fn test_bus_events_are_encoded_in_delivery_order() {
        let (bus, handle) = MockBusChannel::new();
        let (mut client, server) = tokio::io::duplex(256);
        let _task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        for id in [0x100u32, 0x200, 0x300] {
            handle.inject_event(BusEvent {
                bus: "vcan0".to_string(),
                frame: CanFrame::new(id, &[id as u8]).unwrap(),
            });
        }

        // Accumulate bytes until three NUL-delimited events arrived; events
        // may be split across reads.
        let mut received = Vec::new();
        let mut buf = [0u8; 128];
        while received.iter().filter(|&&b| b == 0u8).count() < 3 {
            let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
                .await
                .expect("timed out waiting for events")
                .unwrap();
            received.extend_from_slice(&buf[..n]);
        }

        let expected: Vec<u8> =
            b"< vcan0 f 100 1 00 >\0< vcan0 f 200 1 00 >\0< vcan0 f 300 1 00 >\0".to_vec();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_closed_bus_channel_terminates_the_session() {
        let (bus, handle) = MockBusChannel::new();
        let (_client, server) = tokio::io::duplex(256);
        let task = tokio::spawn(Session::new(server, bus, "test".into(), false).run());

        drop(handle);
        assert_eq!(task.await.unwrap(), SessionEnd::BusChannelClosed);
    }
}
