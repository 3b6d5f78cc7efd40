//! Delayed-execution runtime

mod monitor;

pub use monitor::ScheduleMonitor;
