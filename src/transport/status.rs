//! Status characteristic value shared by the wireless adapter and the scheduler

use irblaster_shared::codec::StatusMessage;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Latest status line, readable at any time and observable for notifications
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<String>>,
}

impl StatusBoard {
    /// A board showing `READY`
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusMessage::Ready.to_string());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current status and wake subscribers
    pub fn post(&self, message: StatusMessage) {
        let text = message.to_string();
        debug!("[BLE] Status -> {}", text);
        self.tx.send_replace(text);
    }

    /// Current status text
    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Receiver that sees every later update
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
