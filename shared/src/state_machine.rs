//! Delayed-Execution State Machine
//!
//! Holds at most one armed command and fires it once the controlling client
//! has been gone for the armed delay.
//!
//! ```text
//! Idle ──arm──▶ ArmedConnected ──disconnect──▶ ArmedCounting ──elapsed──▶ Idle
//!                     ▲                              │
//!                     └──────────connect─────────────┘
//! ```
//!
//! Reconnecting pauses nothing: the countdown start is dropped, and the next
//! disconnect counts the full delay again.

use crate::timing;
use thiserror::Error;

/// Reasons an arm request is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("delay must be greater than zero")]
    InvalidDelay,

    #[error("delay of {0} s exceeds the maximum of {max} s", max = timing::SCHEDULE_DELAY_SEC_MAX)]
    DelayTooLong(u64),

    #[error("command name must not be empty")]
    InvalidName,

    #[error("command name is {0} bytes (max: {max})", max = timing::SCHEDULE_NAME_MAX - 1)]
    NameTooLong(usize),
}

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Nothing armed
    Idle,
    /// Armed while a client is connected, no countdown
    ArmedConnected,
    /// Armed and the client is gone, countdown running
    ArmedCounting,
}

/// The single pending delayed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub command_name: String,
    pub delay_ms: u64,
    pub countdown_start_ms: Option<u64>,
}

/// Remaining time before an armed command fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    pub seconds_remaining: u64,
    pub command_name: String,
}

/// Connection-driven countdown scheduler
#[derive(Debug, Default)]
pub struct DelayScheduler {
    entry: Option<ScheduleEntry>,
    connected: bool,
}

impl DelayScheduler {
    /// Create an idle scheduler with no client connected
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ScheduleState {
        match &self.entry {
            None => ScheduleState::Idle,
            Some(entry) if !self.connected && entry.countdown_start_ms.is_some() => {
                ScheduleState::ArmedCounting
            }
            Some(_) => ScheduleState::ArmedConnected,
        }
    }

    /// Whether a client is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The armed entry, if any
    pub fn entry(&self) -> Option<&ScheduleEntry> {
        self.entry.as_ref()
    }

    /// Validate and store a new entry, replacing any earlier one.
    ///
    /// The countdown waits for the next disconnect. When no client is
    /// connected it starts at `now_ms`.
    pub fn arm(&mut self, delay_seconds: i64, command_name: &str, now_ms: u64) -> Result<(), ScheduleError> {
        if delay_seconds <= 0 {
            return Err(ScheduleError::InvalidDelay);
        }
        let delay_seconds = delay_seconds as u64;
        if delay_seconds > u64::from(timing::SCHEDULE_DELAY_SEC_MAX) {
            return Err(ScheduleError::DelayTooLong(delay_seconds));
        }
        if command_name.is_empty() {
            return Err(ScheduleError::InvalidName);
        }
        if command_name.len() >= timing::SCHEDULE_NAME_MAX {
            return Err(ScheduleError::NameTooLong(command_name.len()));
        }

        self.entry = Some(ScheduleEntry {
            command_name: command_name.to_string(),
            delay_ms: delay_seconds * 1000,
            countdown_start_ms: (!self.connected).then_some(now_ms),
        });
        Ok(())
    }

    /// Client connected. The entry stays armed but stops counting.
    pub fn on_connected(&mut self) {
        self.connected = true;
        if let Some(entry) = self.entry.as_mut() {
            entry.countdown_start_ms = None;
        }
    }

    /// Client went away. An armed entry starts counting from `now_ms`.
    ///
    /// Only the connected→disconnected edge starts a countdown; a repeated
    /// disconnect keeps the running one.
    pub fn on_disconnected(&mut self, now_ms: u64) {
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Some(entry) = self.entry.as_mut() {
            entry.countdown_start_ms = Some(now_ms);
        }
    }

    /// Keepalive from a connected client; no transition.
    pub fn heartbeat(&self) {}

    /// Remaining whole seconds (rounded up) while counting, otherwise `None`
    pub fn countdown(&self, now_ms: u64) -> Option<Countdown> {
        let (entry, elapsed) = self.counting(now_ms)?;
        if elapsed >= entry.delay_ms {
            return None;
        }
        let remaining_ms = entry.delay_ms - elapsed;
        Some(Countdown {
            seconds_remaining: remaining_ms.div_ceil(1000),
            command_name: entry.command_name.clone(),
        })
    }

    /// Disarm and return the command name once the countdown has elapsed
    pub fn poll(&mut self, now_ms: u64) -> Option<String> {
        let (entry, elapsed) = self.counting(now_ms)?;
        if elapsed < entry.delay_ms {
            return None;
        }
        self.entry.take().map(|entry| entry.command_name)
    }

    fn counting(&self, now_ms: u64) -> Option<(&ScheduleEntry, u64)> {
        if self.connected {
            return None;
        }
        let entry = self.entry.as_ref()?;
        let start = entry.countdown_start_ms?;
        Some((entry, now_ms.saturating_sub(start)))
    }
}
