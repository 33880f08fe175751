//! Linux SocketCAN broadcast-manager (BCM) channel.
//!
//! # What is the broadcast manager? (for beginners)
//!
//! SocketCAN is Linux's CAN networking stack.  Besides raw frame sockets,
//! it offers the *broadcast manager*: a kernel service that runs periodic
//! transmission jobs and content-based receive filters on behalf of a
//! process.  A BCM socket is a datagram socket of protocol `CAN_BCM`;
//! every datagram starts with a `bcm_msg_head` (opcode, flags, counters,
//! two intervals, a CAN id, a frame count) followed by that many
//! `can_frame`s.  Writing a datagram installs, updates, or deletes a job;
//! the kernel pushes `RX_CHANGED` datagrams of the same shape back when a
//! subscribed frame's content changes.
//!
//! Each session owns one `BcmChannel`, so the kernel keeps per-client job
//! state (keyed by interface + CAN id) and drops all of it automatically
//! when the socket closes.  The daemon itself holds no job table.
//!
//! The struct layouts and constants below mirror `linux/can/bcm.h`; the
//! `socketcan` ecosystem crate covers raw and ISO-TP sockets but not the
//! broadcast manager, so this adapter speaks to the kernel directly the
//! same way that crate does for its socket types.
//!
//! # Threading
//!
//! `sendto` on a BCM socket never blocks meaningfully, so `submit` runs
//! inline on the session task.  Receiving does block, so each channel
//! spawns a dedicated reader thread (with a 500 ms receive timeout to
//! observe shutdown) that forwards decoded events into a tokio channel
//! consumed by `next_event`.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use canbridge_core::{BusEvent, BusJob, CanFrame, JobKind};
use nix::net::if_::if_nametoindex;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use super::{BusChannel, BusError};

// ── Kernel ABI: linux/can/bcm.h ───────────────────────────────────────────────
// Constants from the C headers.

const CAN_BCM: libc::c_int = 2;

const TX_SETUP: u32 = 1;
const TX_DELETE: u32 = 2;
const TX_SEND: u32 = 4;
const RX_SETUP: u32 = 5;
const RX_DELETE: u32 = 6;

const SETTIMER: u32 = 0x0001;
const STARTTIMER: u32 = 0x0002;
const RX_FILTER_ID: u32 = 0x0020;

/// `struct bcm_timeval`: like `timeval`, but always `long` fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct BcmTimeval {
    tv_sec: libc::c_long,
    tv_usec: libc::c_long,
}

/// `struct bcm_msg_head`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct BcmMsgHead {
    opcode: u32,
    flags: u32,
    count: u32,
    ival1: BcmTimeval,
    ival2: BcmTimeval,
    can_id: u32,
    nframes: u32,
}

/// One BCM datagram as this daemon exchanges it: a head plus exactly one
/// frame slot, the same shape the original gateway protocol works in.
#[repr(C)]
struct BcmMsg {
    head: BcmMsgHead,
    frame: libc::can_frame,
}

/// Maps a job kind to the broadcast-manager opcode and timer flags.
fn bcm_opcode(kind: JobKind) -> (u32, u32) {
    match kind {
        JobKind::SendOnce => (TX_SEND, 0),
        JobKind::AddCyclicSend => (TX_SETUP, SETTIMER | STARTTIMER),
        JobKind::UpdateCyclicSend => (TX_SETUP, 0),
        JobKind::DeleteCyclicSend => (TX_DELETE, 0),
        JobKind::AddReceiveFilter => (RX_SETUP, SETTIMER),
        JobKind::AddContentFilter => (RX_SETUP, SETTIMER | RX_FILTER_ID),
        JobKind::DeleteReceiveFilter => (RX_DELETE, 0),
    }
}

// ── Socket wrapper ────────────────────────────────────────────────────────────

/// Owns the BCM socket fd; shared between the channel and its reader thread.
struct BcmSock {
    fd: RawFd,
}

impl Drop for BcmSock {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// The production [`BusChannel`]: one BCM socket plus its reader thread.
pub struct BcmChannel {
    sock: Arc<BcmSock>,
    events: mpsc::Receiver<BusEvent>,
    running: Arc<AtomicBool>,
}

impl BcmChannel {
    /// Opens a BCM socket connected with interface index 0 (any device;
    /// each job is addressed per `sendto`) and spawns the reader thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Open`] if the socket cannot be created,
    /// connected, or configured.
    pub fn open() -> Result<Self, BusError> {
        let fd = unsafe { libc::socket(libc::PF_CAN, libc::SOCK_DGRAM, CAN_BCM) };
        if fd < 0 {
            return Err(BusError::Open(io::Error::last_os_error()));
        }
        let sock = Arc::new(BcmSock { fd });

        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        let ret = unsafe {
            libc::connect(
                sock.fd,
                &addr as *const libc::sockaddr_can as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(BusError::Open(io::Error::last_os_error()));
        }

        // Receive timeout so the reader thread can observe the running
        // flag instead of blocking in recvfrom forever.
        let tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 500_000,
        };
        let ret = unsafe {
            libc::setsockopt(
                sock.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(BusError::Open(io::Error::last_os_error()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(64);

        let reader_sock = Arc::clone(&sock);
        let reader_running = Arc::clone(&running);
        std::thread::Builder::new()
            .name("bcm-reader".to_string())
            .spawn(move || reader_loop(reader_sock, tx, reader_running))
            .map_err(BusError::Open)?;

        Ok(Self {
            sock,
            events: rx,
            running,
        })
    }
}

impl Drop for BcmChannel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl BusChannel for BcmChannel {
    fn submit(&mut self, job: &BusJob) -> Result<(), BusError> {
        // Resolve fresh per command so interfaces coming up or going away
        // between submissions behave like any other dropped command.
        let ifindex =
            if_nametoindex(job.bus.as_str()).map_err(|_| BusError::UnknownBus(job.bus.clone()))?;

        let (opcode, flags) = bcm_opcode(job.kind);

        let mut msg: BcmMsg = unsafe { mem::zeroed() };
        msg.head.opcode = opcode;
        msg.head.flags = flags;
        msg.head.nframes = 1;
        msg.head.can_id = job.frame.id();
        msg.head.ival2 = BcmTimeval {
            tv_sec: job.interval.sec as libc::c_long,
            tv_usec: job.interval.usec as libc::c_long,
        };
        msg.frame.can_id = job.frame.id();
        msg.frame.can_dlc = job.frame.dlc();
        msg.frame.data[..job.frame.data().len()].copy_from_slice(job.frame.data());

        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex as libc::c_int;

        let ret = unsafe {
            libc::sendto(
                self.sock.fd,
                &msg as *const BcmMsg as *const libc::c_void,
                mem::size_of::<BcmMsg>(),
                0,
                &addr as *const libc::sockaddr_can as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(BusError::Submit(io::Error::last_os_error()));
        }

        trace!(
            bus = %job.bus,
            opcode,
            flags,
            id = job.frame.id(),
            "job submitted to broadcast manager"
        );
        Ok(())
    }

    async fn next_event(&mut self) -> Result<BusEvent, BusError> {
        self.events.recv().await.ok_or(BusError::Closed)
    }
}

// ── Reader thread ─────────────────────────────────────────────────────────────

/// Receives BCM datagrams and forwards decoded events until the channel is
/// dropped or the socket fails.
fn reader_loop(sock: Arc<BcmSock>, tx: mpsc::Sender<BusEvent>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        let mut msg: BcmMsg = unsafe { mem::zeroed() };
        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<libc::sockaddr_can>() as libc::socklen_t;

        let n = unsafe {
            libc::recvfrom(
                sock.fd,
                &mut msg as *mut BcmMsg as *mut libc::c_void,
                mem::size_of::<BcmMsg>(),
                0,
                &mut addr as *mut libc::sockaddr_can as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) {
                continue;
            }
            error!("bcm receive error: {err}");
            break;
        }

        if (n as usize) < mem::size_of::<BcmMsgHead>() || msg.head.nframes == 0 {
            // Status notifications (RX_TIMEOUT, TX_EXPIRED) carry no frame
            // content; nothing to report to the client.
            trace!(opcode = msg.head.opcode, "bcm notification without frame content");
            continue;
        }

        let Some(bus) = interface_name(addr.can_ifindex as libc::c_uint) else {
            debug!(
                ifindex = addr.can_ifindex,
                "event from unresolvable interface dropped"
            );
            continue;
        };

        // The subscription id from the head is reported to the client; dlc
        // and payload come from the embedded frame.
        let payload_len = (msg.frame.can_dlc as usize).min(canbridge_core::CAN_MAX_DLC);
        let frame = match CanFrame::new(msg.head.can_id, &msg.frame.data[..payload_len]) {
            Ok(frame) => frame,
            Err(_) => continue,
        };

        if tx.blocking_send(BusEvent { bus, frame }).is_err() {
            // Session gone; nobody left to deliver to.
            break;
        }
    }
}

/// Resolves a kernel interface index back to its name.
fn interface_name(ifindex: libc::c_uint) -> Option<String> {
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
    let ret = unsafe { libc::if_indextoname(ifindex, buf.as_mut_ptr()) };
    if ret.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    name.to_str().ok().map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_once_maps_to_tx_send_without_flags() {
        assert_eq!(bcm_opcode(JobKind::SendOnce), (TX_SEND, 0));
    }

    #[test]
    fn test_add_cyclic_send_sets_both_timer_flags() {
        let (opcode, flags) = bcm_opcode(JobKind::AddCyclicSend);
        assert_eq!(opcode, TX_SETUP);
        assert_eq!(flags, SETTIMER | STARTTIMER);
    }

    #[test]
    fn test_update_cyclic_send_clears_all_flags() {
        assert_eq!(bcm_opcode(JobKind::UpdateCyclicSend), (TX_SETUP, 0));
    }

    #[test]
    fn test_receive_filter_sets_only_the_timer_flag() {
        assert_eq!(bcm_opcode(JobKind::AddReceiveFilter), (RX_SETUP, SETTIMER));
    }

    #[test]
    fn test_content_filter_sets_timer_and_id_filter_flags() {
        let (opcode, flags) = bcm_opcode(JobKind::AddContentFilter);
        assert_eq!(opcode, RX_SETUP);
        assert_eq!(flags, SETTIMER | RX_FILTER_ID);
    }

    #[test]
    fn test_delete_jobs_carry_no_flags() {
        assert_eq!(bcm_opcode(JobKind::DeleteCyclicSend), (TX_DELETE, 0));
        assert_eq!(bcm_opcode(JobKind::DeleteReceiveFilter), (RX_DELETE, 0));
    }

    #[test]
    fn test_msg_layout_places_the_frame_after_the_head() {
        // The kernel reads the frame array right after the (padded) head.
        let msg: BcmMsg = unsafe { mem::zeroed() };
        let base = &msg as *const BcmMsg as usize;
        let frame_offset = &msg.frame as *const libc::can_frame as usize - base;

        assert!(frame_offset >= mem::size_of::<BcmMsgHead>());
        assert_eq!(
            mem::size_of::<BcmMsg>(),
            frame_offset + mem::size_of::<libc::can_frame>()
        );
    }

    #[test]
    fn test_open_does_not_panic_without_can_support() {
        // On kernels without CAN_BCM (or in restricted sandboxes) open()
        // fails with BusError::Open; with CAN support it succeeds.  Either
        // outcome is acceptable here – we only assert it does not panic.
        match BcmChannel::open() {
            Ok(channel) => drop(channel),
            Err(e) => assert!(matches!(e, BusError::Open(_))),
        }
    }
}
