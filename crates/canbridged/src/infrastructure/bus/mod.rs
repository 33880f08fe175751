//! Bus channel: the capability seam over the kernel's broadcast manager.
//!
//! A session never touches the kernel facility directly; it holds a
//! [`BusChannel`] and calls exactly two operations on it.  The production
//! implementation is [`bcm::BcmChannel`]; tests use
//! [`mock::MockBusChannel`].

use async_trait::async_trait;
use canbridge_core::{BusEvent, BusJob};
use thiserror::Error;

pub mod bcm;
pub mod mock;

pub use bcm::BcmChannel;

/// Error type for bus channel operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus name does not correspond to a live interface right now.
    ///
    /// Resolution happens fresh per command, so interfaces may appear and
    /// disappear between submissions without poisoning the session.
    #[error("no CAN interface named {0:?}")]
    UnknownBus(String),

    /// The broadcast-manager socket could not be opened or connected.
    #[error("failed to open broadcast-manager socket: {0}")]
    Open(#[source] std::io::Error),

    /// Handing the job to the kernel failed.
    #[error("failed to submit job to the broadcast manager: {0}")]
    Submit(#[source] std::io::Error),

    /// The event channel delivers no further events.
    #[error("bus channel closed")]
    Closed,
}

/// One session's private channel to the broadcast-management facility.
#[async_trait]
pub trait BusChannel: Send {
    /// Submits one job.  Does not suspend beyond the transport's normal
    /// non-blocking send.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`]; the session drops the command silently, the
    /// same way it drops a malformed frame.
    fn submit(&mut self, job: &BusJob) -> Result<(), BusError>;

    /// Waits until the next inbound event is available on this channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] when no further events can arrive;
    /// the session terminates.
    async fn next_event(&mut self) -> Result<BusEvent, BusError>;
}
