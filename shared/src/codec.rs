//! Wire payload helpers shared by the front-ends
//!
//! - hex code validation and parsing
//! - the schedule characteristic JSON format:
//! ```text
//! {"delay_seconds": 900, "command": "Off"}   arm
//! {"heartbeat": true}                        keepalive
//! ```
//! - status strings published after sends and scheduler events

use crate::state_machine::ScheduleError;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors decoding a schedule write
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not valid JSON")]
    InvalidJson,

    #[error("payload has neither a heartbeat nor a schedule")]
    UnknownFormat,
}

/// Non-empty string of hex digits, no `0x` prefix
pub fn is_hex_value(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse a hex code into the 32-bit value the codec takes.
///
/// Wider values keep their low 32 bits. This differs from the device
/// firmware, whose `strtoul` saturates anything above 32 bits to
/// `0xFFFFFFFF`.
pub fn parse_hex_code(s: &str) -> Option<u32> {
    if !is_hex_value(s) {
        return None;
    }
    let tail = &s[s.len().saturating_sub(8)..];
    u32::from_str_radix(tail, 16).ok()
}

/// Canonical 8-digit upper-case rendering of a code
pub fn format_code(code: u32) -> String {
    format!("{:08X}", code)
}

/// Whether the transmit codec implements `protocol`
pub fn is_supported_protocol(protocol: &str) -> bool {
    protocol.eq_ignore_ascii_case("NEC")
}

/// A decoded write to the schedule characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleWrite {
    Heartbeat,
    Arm { delay_seconds: i64, command: String },
}

/// Decode a schedule characteristic write
pub fn decode_schedule_write(payload: &[u8]) -> Result<ScheduleWrite, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    let doc: Value = serde_json::from_slice(payload).map_err(|_| CodecError::InvalidJson)?;

    if doc.get("heartbeat").and_then(Value::as_bool) == Some(true) {
        return Ok(ScheduleWrite::Heartbeat);
    }

    let delay = doc.get("delay_seconds").and_then(Value::as_i64);
    let command = doc.get("command").and_then(Value::as_str);
    match (delay, command) {
        (Some(delay_seconds), Some(command)) => Ok(ScheduleWrite::Arm {
            delay_seconds,
            command: command.to_string(),
        }),
        _ => Err(CodecError::UnknownFormat),
    }
}

/// Messages published on the status characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Ready,
    Sent { display: String },
    IndexNotSent { index: usize },
    Unsupported { protocol: String },
    StorageUnavailable,
    EmptyWrite,
    Scheduled,
    ScheduleRejected(ScheduleError),
    ScheduleMalformed(CodecError),
    ScheduledFired { name: String },
    ScheduledSendFailed,
    ScheduledNotFound,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::Ready => write!(f, "READY"),
            StatusMessage::Sent { display } => write!(f, "OK:{}", display),
            StatusMessage::IndexNotSent { index } => write!(f, "ERR:index {}", index),
            StatusMessage::Unsupported { protocol } => write!(f, "ERR:unsupported {}", protocol),
            StatusMessage::StorageUnavailable => write!(f, "ERR:storage"),
            StatusMessage::EmptyWrite => write!(f, "ERR:empty write"),
            StatusMessage::Scheduled => write!(f, "OK:scheduled"),
            StatusMessage::ScheduleRejected(e) => match e {
                ScheduleError::InvalidDelay | ScheduleError::InvalidName => {
                    write!(f, "ERR:schedule invalid")
                }
                ScheduleError::DelayTooLong(_) => write!(f, "ERR:schedule delay too long"),
                ScheduleError::NameTooLong(_) => write!(f, "ERR:schedule name long"),
            },
            StatusMessage::ScheduleMalformed(e) => match e {
                CodecError::Empty => write!(f, "ERR:schedule empty"),
                CodecError::InvalidJson => write!(f, "ERR:schedule json"),
                CodecError::UnknownFormat => write!(f, "ERR:schedule format"),
            },
            StatusMessage::ScheduledFired { name } => write!(f, "OK:scheduled {}", name),
            StatusMessage::ScheduledSendFailed => write!(f, "ERR:scheduled send"),
            StatusMessage::ScheduledNotFound => write!(f, "ERR:scheduled not found"),
        }
    }
}
