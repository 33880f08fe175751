//! Mock bus channel for unit and integration testing.
//!
//! Allows tests to inspect submitted jobs and inject synthetic
//! [`BusEvent`]s without a CAN-capable kernel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canbridge_core::{BusEvent, BusJob};
use tokio::sync::mpsc;

use super::{BusChannel, BusError};

/// A mock implementation of [`BusChannel`].
///
/// Created together with a [`MockBusHandle`] the test keeps; dropping the
/// handle closes the event channel, which a session observes as
/// [`BusError::Closed`].
pub struct MockBusChannel {
    submitted: Arc<Mutex<Vec<BusJob>>>,
    events: mpsc::UnboundedReceiver<BusEvent>,
    reject_bus: Option<String>,
}

/// Test-side handle for a [`MockBusChannel`].
pub struct MockBusHandle {
    submitted: Arc<Mutex<Vec<BusJob>>>,
    events: mpsc::UnboundedSender<BusEvent>,
}

impl MockBusChannel {
    /// Creates a channel that accepts every submission.
    pub fn new() -> (Self, MockBusHandle) {
        Self::with_rejection(None)
    }

    /// Creates a channel that rejects submissions for `bus` with
    /// [`BusError::UnknownBus`], simulating an interface that is down.
    pub fn rejecting(bus: &str) -> (Self, MockBusHandle) {
        Self::with_rejection(Some(bus.to_string()))
    }

    fn with_rejection(reject_bus: Option<String>) -> (Self, MockBusHandle) {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            submitted: Arc::clone(&submitted),
            events: rx,
            reject_bus,
        };
        let handle = MockBusHandle {
            submitted,
            events: tx,
        };
        (channel, handle)
    }
}

impl MockBusHandle {
    /// Injects a synthetic event, as if the kernel delivered it.
    ///
    /// Panics if the channel half has been dropped.
    pub fn inject_event(&self, event: BusEvent) {
        self.events
            .send(event)
            .expect("mock channel receiver dropped");
    }

    /// Returns every job successfully submitted so far.
    pub fn submitted(&self) -> Vec<BusJob> {
        self.submitted.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl BusChannel for MockBusChannel {
    fn submit(&mut self, job: &BusJob) -> Result<(), BusError> {
        if self.reject_bus.as_deref() == Some(job.bus.as_str()) {
            return Err(BusError::UnknownBus(job.bus.clone()));
        }
        self.submitted
            .lock()
            .expect("lock poisoned")
            .push(job.clone());
        Ok(())
    }

    async fn next_event(&mut self) -> Result<BusEvent, BusError> {
        self.events.recv().await.ok_or(BusError::Closed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use canbridge_core::{CanFrame, JobInterval, JobKind};

    fn job(bus: &str) -> BusJob {
        BusJob {
            bus: bus.to_string(),
            kind: JobKind::SendOnce,
            interval: JobInterval::default(),
            frame: CanFrame::new(0x123, &[]).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_submit_records_the_job() {
        let (mut channel, handle) = MockBusChannel::new();
        channel.submit(&job("vcan0")).unwrap();
        assert_eq!(handle.submitted().len(), 1);
        assert_eq!(handle.submitted()[0].bus, "vcan0");
    }

    #[tokio::test]
    async fn test_rejecting_channel_refuses_the_named_bus_only() {
        let (mut channel, handle) = MockBusChannel::rejecting("ghost0");
        assert!(matches!(
            channel.submit(&job("ghost0")),
            Err(BusError::UnknownBus(_))
        ));
        channel.submit(&job("vcan0")).unwrap();
        assert_eq!(handle.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_events_arrive_in_order() {
        let (mut channel, handle) = MockBusChannel::new();
        for id in [1u32, 2, 3] {
            handle.inject_event(BusEvent {
                bus: "vcan0".to_string(),
                frame: CanFrame::new(id, &[]).unwrap(),
            });
        }
        for id in [1u32, 2, 3] {
            assert_eq!(channel.next_event().await.unwrap().frame.id(), id);
        }
    }

    #[tokio::test]
    async fn test_dropping_the_handle_closes_the_channel() {
        let (mut channel, handle) = MockBusChannel::new();
        drop(handle);
        assert!(matches!(
            channel.next_event().await,
            Err(BusError::Closed)
        ));
    }
}
