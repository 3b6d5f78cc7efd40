//! Event source abstraction for pluggable wireless backends

use super::events::TransportEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A link that reports connects, disconnects and characteristic writes
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event. `None` once the link is gone for good.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Human-readable name for this link
    fn name(&self) -> &'static str;
}

/// Event source fed through an mpsc channel
pub struct ChannelEventSource {
    rx: mpsc::Receiver<TransportEvent>,
    name: &'static str,
}

/// Create a sender/source pair for a link called `name`
pub fn event_channel(capacity: usize, name: &'static str) -> (mpsc::Sender<TransportEvent>, ChannelEventSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ChannelEventSource { rx, name })
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
