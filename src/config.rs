//! Runtime configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for the blaster runtime
#[derive(Debug, Clone)]
pub struct BlasterConfig {
    /// Name advertised by the wireless link
    pub device_name: String,
    /// File backing the saved-command namespace
    pub store_path: PathBuf,
    /// Web channel listen address
    pub web_listen: String,
    /// Wireless link listen address (TCP simulation)
    pub ble_listen: String,
    /// Dispatcher pump period
    pub pump_interval: Duration,
    /// Scheduler check period
    pub schedule_interval: Duration,
    /// How long a caller waits for the storage guard
    pub store_lock_timeout: Duration,
    /// Period of the status log line
    pub status_interval: Duration,
    /// Captures a live web client may fall behind before missing some
    pub capture_backlog: usize,
}

impl Default for BlasterConfig {
    fn default() -> Self {
        Self {
            device_name: "IR Blaster".into(),
            store_path: PathBuf::from("ir_saved.json"),
            web_listen: "127.0.0.1:8080".into(),
            ble_listen: "127.0.0.1:9000".into(),
            pump_interval: Duration::from_millis(10),
            schedule_interval: Duration::from_millis(100),
            store_lock_timeout: Duration::from_millis(1000),
            status_interval: Duration::from_secs(1),
            capture_backlog: 16,
        }
    }
}

impl BlasterConfig {
    /// Defaults overridden by `IRBLASTER_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup("IRBLASTER_DEVICE_NAME") {
            config.device_name = name;
        }
        if let Some(path) = lookup("IRBLASTER_STORE") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("IRBLASTER_WEB_LISTEN") {
            config.web_listen = addr;
        }
        if let Some(addr) = lookup("IRBLASTER_BLE_LISTEN") {
            config.ble_listen = addr;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "IRBLASTER_PUMP_MS") {
            config.pump_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "IRBLASTER_SCHEDULE_MS") {
            config.schedule_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "IRBLASTER_STORE_TIMEOUT_MS") {
            config.store_lock_timeout = Duration::from_millis(ms);
        }
        if let Some(backlog) = parse_var::<usize>(&lookup, "IRBLASTER_CAPTURE_BACKLOG") {
            config.capture_backlog = backlog.max(1);
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("[CONFIG] Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}
