//! Received-code feed shared by the decoder and the web channel

use irblaster_shared::{CaptureEvent, CaptureHistory, IrCapture, LastCapture};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capture history plus live fan-out of new captures
#[derive(Clone)]
pub struct CaptureFeed {
    history: Arc<Mutex<CaptureHistory>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureFeed {
    /// A feed whose subscribers may fall `capacity` events behind
    pub fn new(capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(capacity);
        Self {
            history: Arc::new(Mutex::new(CaptureHistory::new())),
            events,
        }
    }

    fn history(&self) -> MutexGuard<'_, CaptureHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point of the decoder: record a capture and notify live clients
    pub fn record(&self, capture: IrCapture) -> u32 {
        info!("[IR] {}", capture.human.replace('\n', " | "));
        debug!("[IR] {}", capture.raw);

        let (seq, event) = {
            let mut history = self.history();
            let seq = history.record(capture);
            (seq, history.event())
        };
        if self.events.send(event).is_err() {
            debug!("[WEB] No live clients for capture #{}", seq);
        }
        seq
    }

    pub fn last(&self) -> LastCapture {
        self.history().last()
    }

    pub fn latest(&self) -> Option<IrCapture> {
        self.history().latest().cloned()
    }

    /// Retained captures, newest first
    pub fn recent(&self) -> Vec<IrCapture> {
        self.history().iter().cloned().collect()
    }

    /// Notification a newly connected live client starts from
    pub fn snapshot(&self) -> CaptureEvent {
        self.history().event()
    }

    /// Receiver of every later capture
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }
}

impl Default for CaptureFeed {
    fn default() -> Self {
        Self::new(16)
    }
}
