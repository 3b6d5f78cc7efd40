//! Received IR codes
//!
//! The decoder hands every frame it recognises to a [`CaptureHistory`],
//! which keeps the most recent ones newest first and numbers them so
//! clients can notice a new capture by polling the sequence.

use crate::codec;
use crate::saved::SavedCommand;
use crate::timing;
use serde::Serialize;
use std::collections::VecDeque;

/// One decoded IR frame
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct IrCapture {
    pub protocol: String,
    pub value: u64,
    pub bits: u16,
    /// Human-readable decode summary
    pub human: String,
    /// Decode rendered as source for hardcoding
    pub raw: String,
}

impl IrCapture {
    /// A capture with default renderings of the decode
    pub fn new(protocol: impl Into<String>, value: u64, bits: u16) -> Self {
        let protocol = protocol.into();
        let human = format!("Protocol  : {}\nCode      : 0x{:X} ({} Bits)", protocol, value, bits);
        let raw = format!("uint64_t data = 0x{:X};  // {} {}b", value, protocol, bits);
        Self {
            protocol,
            value,
            bits,
            human,
            raw,
        }
    }

    /// Replace the renderings with the decoder's own
    pub fn with_text(mut self, human: impl Into<String>, raw: impl Into<String>) -> Self {
        self.human = human.into();
        self.raw = raw.into();
        self
    }

    /// Low 32 bits as 8 upper-case hex digits
    pub fn value_hex(&self) -> String {
        codec::format_code(self.value as u32)
    }

    /// Raw send request that replays this capture, if the codec can send it
    pub fn replay_url(&self) -> Option<String> {
        codec::is_supported_protocol(&self.protocol).then(|| {
            format!("/send?type=nec&data={}&length={}", self.value_hex(), self.bits)
        })
    }

    /// Save request that stores this capture under `name`
    pub fn save_url(&self, name: &str) -> String {
        let mut url = format!(
            "/save?protocol={}&value={}&length={}",
            self.protocol,
            self.value_hex(),
            self.bits
        );
        if !name.is_empty() {
            url.push_str("&name=");
            url.push_str(name);
        }
        url
    }

    /// The record saving this capture would store
    pub fn to_saved(&self, name: impl Into<String>) -> SavedCommand {
        SavedCommand::new(name, self.protocol.clone(), self.value_hex(), self.bits)
    }
}

/// Latest-capture summary polled by clients
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastCapture {
    pub seq: u32,
    pub human: String,
    pub raw: String,
    /// Empty when nothing replayable has been captured
    pub replay_url: String,
}

/// Capture notification pushed to live clients
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub event: &'static str,
    #[serde(flatten)]
    pub last: LastCapture,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits: Option<u16>,
}

/// Bounded, newest-first record of received codes
#[derive(Debug, Clone, Default)]
pub struct CaptureHistory {
    captures: VecDeque<IrCapture>,
    seq: u32,
}

impl CaptureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capture, dropping the oldest beyond the history size.
    /// Returns the new sequence number.
    pub fn record(&mut self, capture: IrCapture) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.captures.push_front(capture);
        self.captures.truncate(timing::CAPTURE_HISTORY_SIZE);
        self.seq
    }

    /// Number of captures recorded so far, including evicted ones
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn latest(&self) -> Option<&IrCapture> {
        self.captures.front()
    }

    /// Retained captures, newest first
    pub fn iter(&self) -> impl Iterator<Item = &IrCapture> {
        self.captures.iter()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn last(&self) -> LastCapture {
        match self.latest() {
            Some(capture) => LastCapture {
                seq: self.seq,
                human: capture.human.clone(),
                raw: capture.raw.clone(),
                replay_url: capture.replay_url().unwrap_or_default(),
            },
            None => LastCapture {
                seq: self.seq,
                ..LastCapture::default()
            },
        }
    }

    /// Notification describing the latest capture
    pub fn event(&self) -> CaptureEvent {
        let latest = self.latest();
        CaptureEvent {
            event: "ir",
            last: self.last(),
            protocol: latest.map(|c| c.protocol.clone()),
            value: latest.map(IrCapture::value_hex),
            bits: latest.map(|c| c.bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let mut history = CaptureHistory::new();
        assert!(history.is_empty());

        for value in 1..=7u64 {
            assert_eq!(history.record(IrCapture::new("NEC", value, 32)), value as u32);
        }

        assert_eq!(history.len(), timing::CAPTURE_HISTORY_SIZE);
        assert_eq!(history.seq(), 7);
        let values: Vec<u64> = history.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![7, 6, 5, 4, 3]);
        assert_eq!(history.latest().unwrap().value, 7);
    }

    #[test]
    fn test_replay_url_only_for_nec() {
        let nec = IrCapture::new("nec", 0x1_00FF_827D, 32);
        assert_eq!(nec.value_hex(), "00FF827D");
        assert_eq!(
            nec.replay_url().as_deref(),
            Some("/send?type=nec&data=00FF827D&length=32")
        );

        let sony = IrCapture::new("SONY", 0x490, 12);
        assert_eq!(sony.replay_url(), None);
        assert_eq!(sony.save_url(""), "/save?protocol=SONY&value=00000490&length=12");
        assert_eq!(
            sony.save_url("Vol"),
            "/save?protocol=SONY&value=00000490&length=12&name=Vol"
        );
    }

    #[test]
    fn test_last_before_any_capture() {
        let history = CaptureHistory::new();
        assert_eq!(
            serde_json::to_value(history.last()).unwrap(),
            json!({ "seq": 0, "human": "", "raw": "", "replayUrl": "" })
        );
        assert_eq!(
            serde_json::to_value(history.event()).unwrap(),
            json!({ "event": "ir", "seq": 0, "human": "", "raw": "", "replayUrl": "" })
        );
    }

    #[test]
    fn test_event_describes_latest_capture() {
        let mut history = CaptureHistory::new();
        history.record(IrCapture::new("SONY", 0x490, 12));
        history.record(IrCapture::new("NEC", 0xFF02FD, 32).with_text("NEC FF02FD", "raw"));

        assert_eq!(
            serde_json::to_value(history.event()).unwrap(),
            json!({
                "event": "ir",
                "seq": 2,
                "human": "NEC FF02FD",
                "raw": "raw",
                "replayUrl": "/send?type=nec&data=00FF02FD&length=32",
                "protocol": "NEC",
                "value": "00FF02FD",
                "bits": 32
            })
        );
    }

    #[test]
    fn test_capture_to_saved_record() {
        let record = IrCapture::new("NEC", 0xFF827D, 32).to_saved("Power");
        assert_eq!(record, SavedCommand::new("Power", "NEC", "00FF827D", 32));
        assert!(record.validate().is_ok());
    }
}
