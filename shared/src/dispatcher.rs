//! Single-slot transmit dispatcher
//!
//! Front-ends hand jobs to a [`TransmitQueue`]; one periodic driver owns the
//! matching [`TransmitPump`] and turns the current job into correctly spaced
//! frames on the IR codec.
//!
//! The queue holds at most one pending job. Queuing overwrites a job that has
//! not started yet, and the pump replaces a job that is mid-sequence as soon
//! as it claims the newer one. The most recent request always wins.

use crate::timing;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The IR codec that puts one frame on the wire
///
/// Transmission is synchronous and assumed not to fail at this layer.
pub trait IrTransmitter: Send {
    /// Emit one frame of `code` using `bits` bits
    fn transmit(&mut self, code: u32, bits: u16);
}

impl<F> IrTransmitter for F
where
    F: FnMut(u32, u16) + Send,
{
    fn transmit(&mut self, code: u32, bits: u16) {
        self(code, bits)
    }
}

/// One transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitJob {
    pub code: u32,
    pub bits: u16,
    pub repeats_remaining: i32,
}

/// State shared between the queue handles and the pump
#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<Option<TransmitJob>>,
    active: AtomicBool,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Option<TransmitJob>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected queue/pump pair around a codec
pub fn transmit_channel<T: IrTransmitter>(transmitter: T) -> (TransmitQueue, TransmitPump<T>) {
    let shared = Arc::new(Shared::default());
    let queue = TransmitQueue {
        shared: shared.clone(),
    };
    let pump = TransmitPump {
        shared,
        transmitter,
        current: None,
        last_send_ms: 0,
        start_immediate: false,
    };
    (queue, pump)
}

/// Cloneable handle used by every front-end to request transmissions
#[derive(Debug, Clone)]
pub struct TransmitQueue {
    shared: Arc<Shared>,
}

impl TransmitQueue {
    /// Replace the pending job. Requests with fewer than one repeat are dropped.
    ///
    /// Never waits for an earlier job to finish.
    pub fn queue(&self, code: u32, bits: u16, repeats: i32) {
        if repeats < 1 {
            return;
        }

        *self.shared.pending() = Some(TransmitJob {
            code,
            bits,
            repeats_remaining: repeats,
        });
    }

    /// Whether the pump is currently working through a job
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Whether a job is waiting to be claimed by the pump
    pub fn has_pending(&self) -> bool {
        self.shared.pending().is_some()
    }
}

/// Drains queued jobs onto the codec. Owned by exactly one periodic driver.
pub struct TransmitPump<T> {
    shared: Arc<Shared>,
    transmitter: T,
    current: Option<TransmitJob>,
    last_send_ms: u64,
    start_immediate: bool,
}

impl<T: IrTransmitter> TransmitPump<T> {
    /// Run one dispatch step at `now_ms`. Returns true if a frame was sent.
    pub fn pump(&mut self, now_ms: u64) -> bool {
        // Copy out under the lock, transmit without it
        let claimed = self.shared.pending().take();
        if let Some(job) = claimed {
            self.current = Some(job);
            self.start_immediate = true;
            self.shared.active.store(true, Ordering::Release);
        }

        let Some(job) = self.current.as_mut() else {
            return false;
        };

        if !self.start_immediate
            && now_ms.saturating_sub(self.last_send_ms) < timing::INTER_FRAME_GAP_MS
        {
            return false;
        }

        let mut sent = false;
        if job.repeats_remaining > 0 {
            self.transmitter.transmit(job.code, job.bits);
            self.last_send_ms = now_ms;
            self.start_immediate = false;
            job.repeats_remaining -= 1;
            sent = true;
        }

        if job.repeats_remaining <= 0 {
            self.current = None;
            self.shared.active.store(false, Ordering::Release);
        }

        sent
    }

    /// The job being transmitted, if any
    pub fn current(&self) -> Option<TransmitJob> {
        self.current
    }

    /// Access the underlying codec
    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }
}
