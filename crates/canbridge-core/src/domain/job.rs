//! Broadcast-manager job and event records.
//!
//! A [`BusJob`] is one fully parsed client command, ready to hand to a bus
//! channel.  It has no retained identity after submission: the kernel's
//! broadcast manager owns all persistent job state, keyed by bus + CAN id,
//! so the daemon holds no job table.

use crate::domain::frame::CanFrame;

/// The operation a client command requests from the broadcast manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// `S` – transmit the frame once, immediately.
    SendOnce,
    /// `A` – create (or replace) a cyclic transmission job and start its timer.
    AddCyclicSend,
    /// `U` – replace the frame of an existing cyclic job without restarting
    /// its timer.
    UpdateCyclicSend,
    /// `D` – remove a cyclic transmission job.
    DeleteCyclicSend,
    /// `R` – subscribe to a CAN id; the kernel reports every content change.
    AddReceiveFilter,
    /// `F` – subscribe to a CAN id with the frame payload as a content
    /// filter pattern.
    AddContentFilter,
    /// `X` – remove a receive subscription.
    DeleteReceiveFilter,
}

impl JobKind {
    /// The wire command character this kind was decoded from.
    pub fn command_char(&self) -> char {
        match self {
            JobKind::SendOnce => 'S',
            JobKind::AddCyclicSend => 'A',
            JobKind::UpdateCyclicSend => 'U',
            JobKind::DeleteCyclicSend => 'D',
            JobKind::AddReceiveFilter => 'R',
            JobKind::AddContentFilter => 'F',
            JobKind::DeleteReceiveFilter => 'X',
        }
    }
}

/// Timer interval carried by every command, kept as the raw
/// second/microsecond pair from the wire.
///
/// Only cyclic-send and receive-filter jobs interpret it; for `S`, `D` and
/// `X` the fields are parsed and validated but otherwise ignored, exactly
/// like the rest of the field grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobInterval {
    pub sec: u64,
    pub usec: u64,
}

/// One fully parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusJob {
    /// Target bus (interface) name, resolved fresh at submission time.
    pub bus: String,
    pub kind: JobKind,
    pub interval: JobInterval,
    pub frame: CanFrame,
}

/// One frame delivered by the broadcast manager on a session's channel.
///
/// Arrival time is implied by delivery order only; no timestamp is
/// forwarded to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    /// Name of the interface the frame arrived on.
    pub bus: String,
    pub frame: CanFrame,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_char_round_trips_every_kind() {
        let kinds = [
            JobKind::SendOnce,
            JobKind::AddCyclicSend,
            JobKind::UpdateCyclicSend,
            JobKind::DeleteCyclicSend,
            JobKind::AddReceiveFilter,
            JobKind::AddContentFilter,
            JobKind::DeleteReceiveFilter,
        ];
        let chars: Vec<char> = kinds.iter().map(|k| k.command_char()).collect();
        assert_eq!(chars, vec!['S', 'A', 'U', 'D', 'R', 'F', 'X']);
    }

    #[test]
    fn test_job_interval_default_is_zero() {
        let interval = JobInterval::default();
        assert_eq!(interval.sec, 0);
        assert_eq!(interval.usec, 0);
    }
}
