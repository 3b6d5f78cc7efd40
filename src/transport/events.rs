//! Events delivered by the wireless link

use bytes::Bytes;
use irblaster_shared::monotonic_ms;
use std::fmt;

/// GATT service carrying every blaster characteristic
pub const SERVICE_UUID: &str = "e97a0001-c116-4a63-a60f-0e9b4d3648f3";

/// Characteristics exposed by the wireless adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Read: compact index/name listing
    SavedCodes,
    /// Write: one byte, the saved-command index
    SendCommand,
    /// Read/notify: last outcome
    Status,
    /// Write: arm JSON or heartbeat
    Schedule,
}

impl Characteristic {
    pub const ALL: [Characteristic; 4] = [
        Characteristic::SavedCodes,
        Characteristic::SendCommand,
        Characteristic::Status,
        Characteristic::Schedule,
    ];

    pub fn uuid(self) -> &'static str {
        match self {
            Characteristic::SavedCodes => "e97a0002-c116-4a63-a60f-0e9b4d3648f3",
            Characteristic::SendCommand => "e97a0003-c116-4a63-a60f-0e9b4d3648f3",
            Characteristic::Status => "e97a0004-c116-4a63-a60f-0e9b4d3648f3",
            Characteristic::Schedule => "e97a0005-c116-4a63-a60f-0e9b4d3648f3",
        }
    }

    /// Look a characteristic up by UUID, ignoring case
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.uuid().eq_ignore_ascii_case(uuid.trim()))
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Characteristic::SavedCodes => write!(f, "SavedCodes"),
            Characteristic::SendCommand => write!(f, "SendCommand"),
            Characteristic::Status => write!(f, "Status"),
            Characteristic::Schedule => write!(f, "Schedule"),
        }
    }
}

/// Events emitted by a wireless link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The controlling client connected
    Connected,
    /// The controlling client went away at `at_ms` on the monotonic clock
    Disconnected { at_ms: u64 },
    /// A client wrote a characteristic value
    Written {
        characteristic: Characteristic,
        payload: Bytes,
    },
}

impl TransportEvent {
    /// A disconnect stamped when the link noticed it
    pub fn disconnected_now() -> Self {
        Self::Disconnected { at_ms: monotonic_ms() }
    }
}
