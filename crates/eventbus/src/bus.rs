//! Per-execution broadcast channels backing the WebSocket node-status
//! stream (§6: "one channel per Execution ... bounded ring buffer if the
//! client lags").

use dashmap::DashMap;
use flowright_core::ExecutionId;
use tokio::sync::broadcast;

use crate::event::NodeStatusEvent;

/// Default number of buffered events per Execution before `tokio::sync::broadcast`
/// starts dropping the oldest ones out from under a lagging subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Fans out `NodeStatusEvent`s to every live subscriber of an Execution.
///
/// One `broadcast::Sender` is created lazily per Execution on first publish
/// or subscribe, and removed once the Execution reaches a terminal status
/// (`close`) so the map doesn't grow without bound across a long-lived
/// process.
pub struct EventBus {
    capacity: usize,
    channels: DashMap<ExecutionId, broadcast::Sender<NodeStatusEvent>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    /// Subscribe to `execution_id`'s event stream, creating it if this is
    /// the first subscriber.
    pub fn subscribe(&self, execution_id: ExecutionId) -> broadcast::Receiver<NodeStatusEvent> {
        self.channels
            .entry(execution_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish `event` to every current subscriber of `execution_id`. A
    /// publish with no subscribers is not an error -- the Control API may
    /// start an Execution before any WebSocket client has connected.
    pub fn publish(&self, execution_id: ExecutionId, event: NodeStatusEvent) {
        let sender = self
            .channels
            .entry(execution_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let _ = sender.send(event);
    }

    /// Drop the channel for `execution_id`. Call once the Execution reaches
    /// a terminal status; existing subscribers keep whatever they've
    /// already received but see the stream end.
    pub fn close(&self, execution_id: ExecutionId) {
        self.channels.remove(&execution_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowright_core::NodeId;
    use flowright_execution::NodeRunStatus;

    fn event(status: NodeRunStatus) -> NodeStatusEvent {
        NodeStatusEvent::new(NodeId::new("n1"), status, Utc::now())
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let execution_id = ExecutionId::new();
        let mut rx = bus.subscribe(execution_id);

        bus.publish(execution_id, event(NodeRunStatus::Running));
        bus.publish(execution_id, event(NodeRunStatus::Completed));

        assert_eq!(rx.recv().await.unwrap().status, NodeRunStatus::Running);
        assert_eq!(rx.recv().await.unwrap().status, NodeRunStatus::Completed);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        bus.publish(ExecutionId::new(), event(NodeRunStatus::Completed));
    }

    #[tokio::test]
    async fn close_drops_the_channel_so_late_subscribers_start_fresh() {
        let bus = EventBus::new();
        let execution_id = ExecutionId::new();
        let mut rx = bus.subscribe(execution_id);
        bus.publish(execution_id, event(NodeRunStatus::Completed));
        rx.recv().await.unwrap();

        bus.close(execution_id);

        let mut rx2 = bus.subscribe(execution_id);
        bus.publish(execution_id, event(NodeRunStatus::Running));
        assert_eq!(rx2.recv().await.unwrap().status, NodeRunStatus::Running);
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_a_lag_error_instead_of_unbounded_growth() {
        let bus = EventBus::with_capacity(2);
        let execution_id = ExecutionId::new();
        let mut rx = bus.subscribe(execution_id);

        for _ in 0..5 {
            bus.publish(execution_id, event(NodeRunStatus::Running));
        }

        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(_))));
    }
}
