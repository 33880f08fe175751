//! Application layer: the per-connection session event loop.
//!
//! The session orchestrates pure protocol code from `canbridge-core` and
//! the bus channel abstraction from `infrastructure::bus`; it contains no
//! socket setup or kernel calls of its own, which is what makes it fully
//! drivable from tests over in-memory streams.

pub mod session;

pub use session::{Session, SessionEnd};
