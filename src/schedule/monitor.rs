//! Schedule Monitor
//!
//! Owns the delayed-execution state machine, feeds it link events and runs a
//! background check that fires the armed command once its countdown elapses.

use crate::command::{ResolveError, Resolver};
use crate::transport::StatusBoard;
use irblaster_shared::{
    codec::StatusMessage, monotonic_ms, Countdown, DelayScheduler, ScheduleError, ScheduleState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Async owner of the [`DelayScheduler`]
#[derive(Clone)]
pub struct ScheduleMonitor {
    /// The state machine
    fsm: Arc<RwLock<DelayScheduler>>,
    /// Sends the fired command
    resolver: Resolver,
    /// Receives the fire outcome
    status: StatusBoard,
    /// Set while the background check runs
    monitoring_active: Arc<RwLock<bool>>,
}

impl ScheduleMonitor {
    pub fn new(resolver: Resolver, status: StatusBoard) -> Self {
        Self {
            fsm: Arc::new(RwLock::new(DelayScheduler::new())),
            resolver,
            status,
            monitoring_active: Arc::new(RwLock::new(false)),
        }
    }

    /// Arm `command_name` to run `delay_seconds` after the client leaves
    pub async fn arm(&self, delay_seconds: i64, command_name: &str) -> Result<(), ScheduleError> {
        self.arm_at(delay_seconds, command_name, monotonic_ms()).await
    }

    pub async fn arm_at(&self, delay_seconds: i64, command_name: &str, now_ms: u64) -> Result<(), ScheduleError> {
        let mut fsm = self.fsm.write().await;
        match fsm.arm(delay_seconds, command_name, now_ms) {
            Ok(()) => {
                info!(
                    "[SCHED] Armed {:?} to run {} s after disconnect",
                    command_name, delay_seconds
                );
                Ok(())
            }
            Err(e) => {
                warn!("[SCHED] Arm rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Keepalive from the connected client
    pub async fn heartbeat(&self) {
        self.fsm.read().await.heartbeat();
        debug!("[SCHED] Heartbeat");
    }

    /// The controlling client connected
    pub async fn on_connected(&self) {
        let mut fsm = self.fsm.write().await;
        let was_counting = fsm.state() == ScheduleState::ArmedCounting;
        fsm.on_connected();
        if was_counting {
            info!("[SCHED] Client back, countdown paused");
        }
    }

    /// The controlling client disconnected at `now_ms`
    pub async fn on_disconnected_at(&self, now_ms: u64) {
        let mut fsm = self.fsm.write().await;
        let was_connected = fsm.is_connected();
        fsm.on_disconnected(now_ms);
        if let Some(entry) = fsm.entry().filter(|_| was_connected) {
            info!(
                "[SCHED] Countdown started: {} s until {}",
                entry.delay_ms / 1000,
                entry.command_name
            );
        }
    }

    /// Remaining time while a countdown is running
    pub async fn countdown(&self) -> Option<Countdown> {
        self.countdown_at(monotonic_ms()).await
    }

    pub async fn countdown_at(&self, now_ms: u64) -> Option<Countdown> {
        self.fsm.read().await.countdown(now_ms)
    }

    pub async fn state(&self) -> ScheduleState {
        self.fsm.read().await.state()
    }

    /// Fire the armed command if its countdown has elapsed at `now_ms`.
    ///
    /// The entry is disarmed before the send, whatever the outcome.
    pub async fn tick_at(&self, now_ms: u64) -> Option<StatusMessage> {
        let name = self.fsm.write().await.poll(now_ms)?;

        let status = match self.resolver.resolve_by_name(&name).await {
            Ok(Some(index)) => match self.resolver.send_saved(index).await {
                Ok(sent) => {
                    info!("[SCHED] Scheduled command executed: {}", sent.display_name());
                    StatusMessage::ScheduledFired {
                        name: sent.display_name(),
                    }
                }
                Err(e) => {
                    error!("[SCHED] Scheduled send of {:?} failed: {}", name, e);
                    StatusMessage::ScheduledSendFailed
                }
            },
            Ok(None) => {
                warn!("[SCHED] Scheduled command not found: {}", name);
                StatusMessage::ScheduledNotFound
            }
            Err(ResolveError::Store(e)) => {
                error!("[SCHED] Lookup of {:?} failed: {}", name, e);
                StatusMessage::ScheduledSendFailed
            }
            Err(e) => {
                error!("[SCHED] Lookup of {:?} failed: {}", name, e);
                StatusMessage::ScheduledNotFound
            }
        };

        self.status.post(status.clone());
        Some(status)
    }

    /// Start the periodic check. Returns `None` if it is already running.
    pub async fn start_monitoring(&self, period: Duration) -> Option<JoinHandle<()>> {
        let mut active = self.monitoring_active.write().await;
        if *active {
            warn!("[SCHED] Monitoring already active");
            return None;
        }
        *active = true;
        drop(active);

        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if !*monitor.monitoring_active.read().await {
                    break;
                }
                monitor.tick_at(monotonic_ms()).await;
            }

            info!("[SCHED] Monitoring stopped");
        });

        Some(handle)
    }

    /// Ask the periodic check to exit after its current tick
    pub async fn stop_monitoring(&self) {
        *self.monitoring_active.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreGuard;
    use irblaster_shared::{transmit_channel, MemoryStore, SavedCommand, SavedCommands, TransmitPump};
    use std::sync::Mutex;

    type Frames = Arc<Mutex<Vec<(u32, u16)>>>;

    fn setup() -> (
        ScheduleMonitor,
        StatusBoard,
        TransmitPump<impl irblaster_shared::IrTransmitter>,
        Frames,
    ) {
        let mut store = MemoryStore::new();
        {
            let mut saved = SavedCommands::new(&mut store);
            saved.append(&SavedCommand::new("Off", "NEC", "FF02FD", 32)).unwrap();
            saved.append(&SavedCommand::new("Volume", "SONY", "490", 12)).unwrap();
        }
        let frames: Frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let (queue, pump) = transmit_channel(move |code: u32, bits: u16| {
            sink.lock().unwrap().push((code, bits));
        });
        let resolver = Resolver::new(StoreGuard::new(store, Duration::from_millis(100)), queue);
        let status = StatusBoard::new();
        (ScheduleMonitor::new(resolver, status.clone()), status, pump, frames)
    }

    #[tokio::test]
    async fn test_fires_once_after_disconnect_delay() {
        let (monitor, status, mut pump, frames) = setup();
        monitor.on_connected().await;
        monitor.arm_at(5, "Off", 0).await.unwrap();
        assert_eq!(monitor.state().await, ScheduleState::ArmedConnected);

        // No countdown while connected
        assert_eq!(monitor.tick_at(60_000).await, None);

        monitor.on_disconnected_at(100_000).await;
        assert_eq!(monitor.countdown_at(100_001).await.unwrap().seconds_remaining, 5);
        assert_eq!(monitor.tick_at(104_999).await, None);

        assert_eq!(
            monitor.tick_at(105_000).await,
            Some(StatusMessage::ScheduledFired { name: "Off".into() })
        );
        assert_eq!(status.current(), "OK:scheduled Off");
        assert_eq!(monitor.state().await, ScheduleState::Idle);
        assert_eq!(monitor.tick_at(200_000).await, None);

        pump.pump(0);
        assert_eq!(*frames.lock().unwrap(), vec![(0x00FF_02FD, 32)]);
    }

    #[tokio::test]
    async fn test_reconnect_restarts_full_delay() {
        let (monitor, _status, _pump, _frames) = setup();
        monitor.on_connected().await;
        monitor.arm_at(10, "off", 0).await.unwrap();

        monitor.on_disconnected_at(1_000).await;
        monitor.on_connected().await;
        monitor.on_disconnected_at(8_000).await;

        assert_eq!(monitor.tick_at(11_000).await, None);
        assert!(monitor.tick_at(18_000).await.is_some());
    }

    #[tokio::test]
    async fn test_missing_command_reports_not_found() {
        let (monitor, status, _pump, _frames) = setup();
        monitor.arm_at(1, "Input", 0).await.unwrap();

        assert_eq!(monitor.tick_at(1_000).await, Some(StatusMessage::ScheduledNotFound));
        assert_eq!(status.current(), "ERR:scheduled not found");
        assert_eq!(monitor.state().await, ScheduleState::Idle);
    }

    #[tokio::test]
    async fn test_unsupported_command_reports_send_failure() {
        let (monitor, status, _pump, _frames) = setup();
        monitor.arm_at(1, "Volume", 0).await.unwrap();

        assert_eq!(monitor.tick_at(2_000).await, Some(StatusMessage::ScheduledSendFailed));
        assert_eq!(status.current(), "ERR:scheduled send");
    }

    #[tokio::test]
    async fn test_invalid_arm_keeps_previous_entry() {
        let (monitor, _status, _pump, _frames) = setup();
        monitor.on_connected().await;
        monitor.arm_at(30, "Off", 0).await.unwrap();

        assert_eq!(monitor.arm_at(0, "Off", 0).await, Err(ScheduleError::InvalidDelay));
        assert_eq!(monitor.arm_at(5, "", 0).await, Err(ScheduleError::InvalidName));

        monitor.on_disconnected_at(0).await;
        assert_eq!(monitor.countdown_at(0).await.unwrap().seconds_remaining, 30);
    }

    #[tokio::test]
    async fn test_background_check_fires() {
        let (monitor, status, _pump, _frames) = setup();
        monitor.on_connected().await;
        monitor.arm(1, "Off").await.unwrap();
        monitor.on_disconnected_at(monotonic_ms()).await;

        let handle = monitor.start_monitoring(Duration::from_millis(20)).await.unwrap();
        assert!(monitor.start_monitoring(Duration::from_millis(20)).await.is_none());

        let mut rx = status.subscribe();
        tokio::time::timeout(Duration::from_secs(3), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.current(), "OK:scheduled Off");

        monitor.stop_monitoring().await;
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
