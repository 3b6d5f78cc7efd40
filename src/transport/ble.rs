//! Wireless (GATT-shaped) adapter
//!
//! Turns link events into resolver, scheduler and status-board calls. The
//! radio stack itself lives behind [`EventSource`].

use super::events::{Characteristic, TransportEvent};
use super::status::StatusBoard;
use super::traits::EventSource;
use crate::command::{ResolveError, Resolver};
use crate::schedule::ScheduleMonitor;
use bytes::Bytes;
use irblaster_shared::codec::{decode_schedule_write, ScheduleWrite, StatusMessage};
use tracing::{debug, info, warn};

/// Characteristic handlers of the blaster service
#[derive(Clone)]
pub struct BleAdapter {
    resolver: Resolver,
    schedule: ScheduleMonitor,
    status: StatusBoard,
}

impl BleAdapter {
    pub fn new(resolver: Resolver, schedule: ScheduleMonitor, status: StatusBoard) -> Self {
        Self {
            resolver,
            schedule,
            status,
        }
    }

    /// Consume events from `source` until it closes
    pub async fn run<S: EventSource>(&self, mut source: S) {
        info!("[BLE] Listening on {} link", source.name());
        while let Some(event) = source.next_event().await {
            self.handle(event).await;
        }
        info!("[BLE] {} link closed", source.name());
    }

    /// Apply one link event
    pub async fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("[BLE] Client connected");
                self.schedule.on_connected().await;
            }
            TransportEvent::Disconnected { at_ms } => {
                info!("[BLE] Client disconnected");
                // Counts from when the link dropped, not from when it was handled
                self.schedule.on_disconnected_at(at_ms).await;
            }
            TransportEvent::Written {
                characteristic,
                payload,
            } => match characteristic {
                Characteristic::SendCommand => self.on_send_command(&payload).await,
                Characteristic::Schedule => self.on_schedule(&payload).await,
                other => warn!("[BLE] Write to read-only characteristic {}", other),
            },
        }
    }

    /// Current value of a readable characteristic
    pub async fn read(&self, characteristic: Characteristic) -> Bytes {
        match characteristic {
            Characteristic::SavedCodes => {
                let json = match self
                    .resolver
                    .store()
                    .with_saved(|saved| saved.compact_listing())
                    .await
                {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("[BLE] Saved codes unavailable: {}", e);
                        "[]".to_string()
                    }
                };
                info!("[BLE] Saved codes read ({} bytes)", json.len());
                Bytes::from(json)
            }
            Characteristic::Status => Bytes::from(self.status.current()),
            _ => Bytes::new(),
        }
    }

    async fn on_send_command(&self, payload: &[u8]) {
        let Some(&first) = payload.first() else {
            self.status.post(StatusMessage::EmptyWrite);
            return;
        };
        let index = usize::from(first);

        let status = match self.resolver.send_saved(index).await {
            Ok(sent) => StatusMessage::Sent {
                display: sent.display_name(),
            },
            Err(ResolveError::Unsupported { protocol, .. }) => StatusMessage::Unsupported { protocol },
            Err(ResolveError::Store(_)) => StatusMessage::StorageUnavailable,
            Err(_) => StatusMessage::IndexNotSent { index },
        };
        info!("[BLE] Send command: index={} -> {}", index, status);
        self.status.post(status);
    }

    async fn on_schedule(&self, payload: &[u8]) {
        let status = match decode_schedule_write(payload) {
            Ok(ScheduleWrite::Heartbeat) => {
                self.schedule.heartbeat().await;
                return;
            }
            Ok(ScheduleWrite::Arm {
                delay_seconds,
                command,
            }) => match self.schedule.arm(delay_seconds, &command).await {
                Ok(()) => StatusMessage::Scheduled,
                Err(e) => StatusMessage::ScheduleRejected(e),
            },
            Err(e) => {
                debug!("[BLE] Schedule write rejected: {}", e);
                StatusMessage::ScheduleMalformed(e)
            }
        };
        self.status.post(status);
    }
}
