use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Published when the capture phase finishes one page.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub url: String,
    pub action_label: String,
    pub reliability_score: u8,
    pub contamination_reasons: Vec<String>,
    pub screenshot_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Process-wide publish/subscribe channel decoupling capture
/// completion from downstream recorders.
///
/// Constructed once at process start and passed by reference; there is
/// no implicit global instance.
pub struct EventBus {
    tx: broadcast::Sender<CaptureEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: CaptureEvent) {
        let receivers = self.tx.receiver_count();
        if self.tx.send(event).is_err() {
            ::log::trace!("Capture event published with no subscribers");
        } else {
            ::log::trace!("Capture event delivered to {} subscribers", receivers);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
