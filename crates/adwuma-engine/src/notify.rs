//! Notification sink
//!
//! Fire-and-forget delivery of lifecycle and payment events to whatever
//! cares (push, SMS, admin feeds). A sink failure must never roll back the
//! transition that produced the event, so `emit` is infallible at this
//! boundary; implementations log and drop on error.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::event::TaskEvent;

/// Receives committed lifecycle/payment events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: &TaskEvent);
}

/// Sink that drops everything (tests, embedders without notifications)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn emit(&self, _event: &TaskEvent) {}
}

/// Sink that logs each event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn emit(&self, event: &TaskEvent) {
        info!(
            task_id = %event.task_id,
            seq = event.seq,
            event_type = event.kind.type_name(),
            "Lifecycle event"
        );
    }
}

/// Sink that forwards events over an mpsc channel
///
/// A full or closed channel drops the event; delivery is best-effort.
pub struct ChannelSink {
    tx: mpsc::Sender<TaskEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TaskEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn emit(&self, event: &TaskEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(
                task_id = %event.task_id,
                event_type = event.kind.type_name(),
                error = %e,
                "Dropped notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TaskEventKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx);

        let event = TaskEvent::new(Uuid::now_v7(), TaskEventKind::EscrowFrozen, Uuid::now_v7());
        sink.emit(&event).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);

        let event = TaskEvent::new(Uuid::now_v7(), TaskEventKind::EscrowFrozen, Uuid::now_v7());
        // Second emit overflows the bounded channel; it must not error
        sink.emit(&event).await;
        sink.emit(&event).await;
    }
}
