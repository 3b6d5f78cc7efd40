//! IR Blaster Shared Core
//!
//! This crate provides the runtime-free core of the IR Blaster: the
//! single-slot transmit dispatcher, the delayed-execution state machine,
//! the saved-command namespace, the received-code history and the wire
//! payload helpers used by every front-end.

pub mod capture;
pub mod codec;
pub mod dispatcher;
pub mod saved;
pub mod state_machine;
pub mod store;

use std::sync::OnceLock;
use std::time::Instant;

pub use capture::{CaptureEvent, CaptureHistory, IrCapture, LastCapture};
pub use dispatcher::{transmit_channel, IrTransmitter, TransmitJob, TransmitPump, TransmitQueue};
pub use saved::{ImportSummary, SavedCommand, SavedCommands, SavedEntry, SavedError};
pub use state_machine::{Countdown, DelayScheduler, ScheduleEntry, ScheduleError, ScheduleState};
pub use store::{KvStore, MemoryStore, StoreError};

/// Milliseconds elapsed on a monotonic clock since the first call in this process
pub fn monotonic_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Timing and size parameters of the blaster protocol
pub mod timing {
    /// Minimum gap between two frames of the same job (NEC inter-frame spacing)
    pub const INTER_FRAME_GAP_MS: u64 = 50;

    /// Size of the scheduled command name buffer, terminator included
    pub const SCHEDULE_NAME_MAX: usize = 32;

    /// Largest delay whose millisecond value still fits in a u32
    pub const SCHEDULE_DELAY_SEC_MAX: u32 = u32::MAX / 1000;

    /// A serialized saved record must stay strictly below this size
    pub const SAVED_RECORD_MAX: usize = 512;

    /// Size budget of the compact listing read over the wireless link
    pub const COMPACT_LISTING_MAX: usize = 590;

    /// Room kept free for the truncation sentinel of the compact listing
    pub const COMPACT_TRUNCATED_SUFFIX: usize = 50;

    /// Bit length bounds of a stored code
    pub const SAVED_BITS_MIN: u16 = 1;
    pub const SAVED_BITS_MAX: u16 = 64;

    /// Default bit length when a record or request omits it
    pub const DEFAULT_BITS: u16 = 32;

    /// Bounds accepted by the raw send endpoint
    pub const SEND_LENGTH_MAX: u16 = 128;
    pub const SEND_REPEAT_MAX: i32 = 20;

    /// Body limits of the web front-end
    pub const SAVE_BODY_MAX: usize = 2048;
    pub const IMPORT_BODY_MAX: usize = 10240;

    /// Per-entry errors reported back from one import
    pub const IMPORT_MAX_ERRORS: usize = 12;

    /// Received codes kept for saving and replay
    pub const CAPTURE_HISTORY_SIZE: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let a = monotonic_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = monotonic_ms();
        assert!(b >= a + 1);
    }

    #[test]
    fn test_delay_max_fits_in_millis() {
        let ms = u64::from(timing::SCHEDULE_DELAY_SEC_MAX) * 1000;
        assert!(ms <= u64::from(u32::MAX));
        assert_eq!(timing::SCHEDULE_DELAY_SEC_MAX, 4_294_967);
    }
}
