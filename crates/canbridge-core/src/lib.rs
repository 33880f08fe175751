//! # canbridge-core
//!
//! Shared library for CANBridge containing the ASCII wire protocol codec,
//! the inbound framing state machine, the domain records exchanged between
//! the protocol layer and the bus adapters, and the discovery beacon
//! payload builder.
//!
//! This crate is used by the daemon and by protocol-level tests.
//! It has zero dependencies on sockets, the async runtime, or the kernel
//! CAN facility – everything here is pure translation.
//!
//! # Architecture overview (for beginners)
//!
//! CANBridge is a gateway daemon: it exposes a host's CAN (Controller Area
//! Network) buses to remote TCP clients.  A client sends compact ASCII
//! commands like `< vcan0 A 0 100000 123 2 DE AD >` ("transmit id 0x123
//! with payload DE AD on vcan0 every 100 ms") and receives notifications
//! like `< vcan0 f 123 2 DE AD >` whenever a subscribed frame changes on
//! the bus.
//!
//! This crate (`canbridge-core`) is the translation layer between those
//! ASCII frames and typed Rust records:
//!
//! - **`protocol`** – How bytes travel over the TCP session.  The framing
//!   state machine assembles `<`/`>` delimited frames from a byte stream,
//!   the codec turns a complete frame into a [`BusJob`] (inbound) or a
//!   [`BusEvent`] into wire bytes (outbound), and the beacon builder
//!   renders the UDP discovery datagram.
//!
//! - **`domain`** – The records themselves: a classic CAN frame, a job
//!   for the kernel's broadcast manager, and a bus event.  Constructors
//!   enforce the invariants (payload length equals the data length code,
//!   dlc at most 8) so the rest of the system never re-checks them.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `canbridge_core::BusJob` instead of `canbridge_core::domain::job::BusJob`.
pub use domain::frame::{CanFrame, FrameError, CAN_MAX_DLC};
pub use domain::job::{BusEvent, BusJob, JobInterval, JobKind};
pub use protocol::beacon::{build_beacon, BEACON_CAPACITY};
pub use protocol::codec::{decode_command, encode_event, DecodeError, MAX_BUS_NAME};
pub use protocol::framing::{FramingState, MAX_FRAME_LEN};
