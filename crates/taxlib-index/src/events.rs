//! Indexing notifications fanned out to any number of subscribers.

use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    Started,
    /// Share of the build queue already drained, 0.0..=1.0.
    Progress { fraction: f32 },
    Completed { had_errors: bool },
    Error { cause: String },
}

/// Broadcast channel for `IndexEvent`s. Publishing never blocks and works from
/// plain threads; receivers that fall behind see `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }

    /// Number of subscribers reached; zero when nobody listens.
    pub fn publish(&self, event: IndexEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
