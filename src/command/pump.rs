//! Periodic driver for the transmit pump

use irblaster_shared::codec::format_code;
use irblaster_shared::{monotonic_ms, IrTransmitter, TransmitPump};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

/// Codec stand-in for hosts without an IR LED: logs every frame
#[derive(Debug, Default)]
pub struct LogTransmitter {
    frames: u64,
}

impl IrTransmitter for LogTransmitter {
    fn transmit(&mut self, code: u32, bits: u16) {
        self.frames += 1;
        info!("[IR] Frame #{}: NEC 0x{} {}b", self.frames, format_code(code), bits);
    }
}

/// Owns the pump and runs it from a single task
pub struct PumpDriver<T> {
    pump: TransmitPump<T>,
    period: Duration,
}

impl<T: IrTransmitter + 'static> PumpDriver<T> {
    /// Create a driver that pumps every `period`
    pub fn new(pump: TransmitPump<T>, period: Duration) -> Self {
        Self { pump, period }
    }

    /// Start the pump loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Pump forever
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("[IR] Pump running every {} ms", self.period.as_millis());

        loop {
            ticker.tick().await;
            self.pump.pump(monotonic_ms());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irblaster_shared::transmit_channel;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_driver_drains_queued_job() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let (queue, pump) = transmit_channel(move |code: u32, bits: u16| {
            sink.lock().unwrap().push((code, bits));
        });
        let handle = PumpDriver::new(pump, Duration::from_millis(5)).spawn();

        queue.queue(0x00FF_827D, 32, 3);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(frames.lock().unwrap().len(), 3);
        assert!(!queue.is_active());
        handle.abort();
    }

    #[test]
    fn test_log_transmitter_counts_frames() {
        let mut tx = LogTransmitter::default();
        tx.transmit(0x1, 32);
        tx.transmit(0x2, 32);
        assert_eq!(tx.frames, 2);
    }
}
