//! Completion notifications of background jobs.

use tokio::sync::broadcast;

use rebroker_state::{InstanceId, OperationId, OperationKind, OperationState};

const CHANNEL_CAPACITY: usize = 256;

/// Published once a background job has written its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEvent {
    pub instance_id: InstanceId,
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub state: OperationState,
}

/// Broadcast bus for [`OperationEvent`]s. Publishing never blocks and is a
/// no-op without subscribers.
#[derive(Clone)]
pub struct OperationEvents {
    tx: broadcast::Sender<OperationEvent>,
}

impl OperationEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: OperationEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for OperationEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(op: &str) -> OperationEvent {
        OperationEvent {
            instance_id: "inst-1".to_string(),
            operation_id: op.to_string(),
            kind: OperationKind::Create,
            state: OperationState::Succeeded,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let events = OperationEvents::new();
        let mut rx = events.subscribe();

        events.publish(event("op-1"));
        events.publish(event("op-2"));

        assert_eq!(rx.recv().await.unwrap().operation_id, "op-1");
        assert_eq!(rx.recv().await.unwrap().operation_id, "op-2");
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        OperationEvents::new().publish(event("op-1"));
    }
}
