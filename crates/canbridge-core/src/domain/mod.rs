//! Domain records exchanged between the protocol layer and the bus adapters.
//!
//! Pure data with invariant-enforcing constructors; no I/O, no OS calls.

pub mod frame;
pub mod job;

pub use frame::{CanFrame, FrameError, CAN_MAX_DLC};
pub use job::{BusEvent, BusJob, JobInterval, JobKind};
