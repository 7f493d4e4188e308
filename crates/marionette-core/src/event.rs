use crate::types::{LogEntry, RunStatus};

/// An observational event published during a run. Not load-bearing for
/// correctness; subscribers may lag or drop without affecting execution.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A line was appended to the run log.
    Log(LogEntry),
    /// A full status snapshot.
    Status(RunStatus),
}

/// Fan-out bus for run observation, backed by a tokio broadcast channel.
/// Every subscriber sees every event; a subscriber that falls more than
/// `capacity` events behind starts receiving `Lagged` and misses the
/// overwritten entries, while the run itself is never back-pressured.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to all current subscribers. With nobody listening the event
    /// is dropped; the run does not care whether it is observed.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
