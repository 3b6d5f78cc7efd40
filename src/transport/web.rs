//! Web channel adapter
//!
//! Request handlers of the HTTP/WebSocket front-end. Each returns a
//! [`WebResponse`] carrying the status code the device answers with.

use super::capture::CaptureFeed;
use crate::command::{CommandRef, ResolveError, Resolver};
use crate::schedule::ScheduleMonitor;
use irblaster_shared::codec::{is_hex_value, parse_hex_code};
use irblaster_shared::{timing, IrCapture, SavedCommand, SavedError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

/// A response of the web channel
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl WebResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: JSON,
            body: body.to_string(),
        }
    }

    pub(crate) fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: body.into(),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }
}

/// One request of the web channel, as carried over the line protocol
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WebRequest {
    Send {
        #[serde(rename = "type")]
        kind: Option<String>,
        data: Option<String>,
        length: Option<i64>,
        repeat: Option<i64>,
    },
    WsSend {
        body: String,
    },
    Save {
        body: String,
    },
    Import {
        body: String,
    },
    List,
    Delete {
        index: Option<i64>,
    },
    Rename {
        index: Option<i64>,
        name: Option<String>,
    },
    Dump,
    SendSaved {
        index: Option<usize>,
        name: Option<String>,
    },
    Countdown,
    Transmitting,
    /// Latest received code, for polling clients
    Last,
    /// Retained received codes, newest first
    History,
    /// Save the given code, or the latest received one
    SaveLast {
        name: Option<String>,
        protocol: Option<String>,
        value: Option<String>,
        length: Option<i64>,
    },
    /// A decoded frame from the receiver
    Receive {
        protocol: Option<String>,
        value: Option<String>,
        bits: Option<i64>,
        human: Option<String>,
        raw: Option<String>,
    },
    /// Live client joined; answers with the latest capture
    WsConnect,
}

/// Handlers of the web channel
#[derive(Clone)]
pub struct WebApi {
    resolver: Resolver,
    schedule: ScheduleMonitor,
    captures: CaptureFeed,
}

impl WebApi {
    pub fn new(resolver: Resolver, schedule: ScheduleMonitor, captures: CaptureFeed) -> Self {
        Self {
            resolver,
            schedule,
            captures,
        }
    }

    pub fn captures(&self) -> &CaptureFeed {
        &self.captures
    }

    /// Route a request to its handler. `ws_send` requests the device ignores
    /// answer with an empty 204.
    pub async fn handle(&self, request: WebRequest) -> WebResponse {
        match request {
            WebRequest::Send {
                kind,
                data,
                length,
                repeat,
            } => self.send(kind.as_deref(), data.as_deref(), length, repeat),
            WebRequest::WsSend { body } => match self.ws_send(&body) {
                Some(reply) => WebResponse::json(200, reply),
                None => WebResponse::text(204, ""),
            },
            WebRequest::Save { body } => self.save(&body).await,
            WebRequest::Import { body } => self.import(&body).await,
            WebRequest::List => self.list().await,
            WebRequest::Delete { index } => self.delete(index).await,
            WebRequest::Rename { index, name } => self.rename(index, name.as_deref()).await,
            WebRequest::Dump => self.dump().await,
            WebRequest::SendSaved { index, name } => {
                let target = match (index, name) {
                    (Some(index), _) => CommandRef::Index(index),
                    (None, Some(name)) => CommandRef::Name(name),
                    (None, None) => return WebResponse::error(400, "Missing index or name"),
                };
                self.send_saved(target).await
            }
            WebRequest::Countdown => self.countdown().await,
            WebRequest::Transmitting => self.transmitting(),
            WebRequest::Last => self.last(),
            WebRequest::History => self.history(),
            WebRequest::SaveLast {
                name,
                protocol,
                value,
                length,
            } => {
                self.save_last(name.as_deref(), protocol.as_deref(), value.as_deref(), length)
                    .await
            }
            WebRequest::Receive {
                protocol,
                value,
                bits,
                human,
                raw,
            } => self.receive(protocol.as_deref(), value.as_deref(), bits, human, raw),
            WebRequest::WsConnect => WebResponse::json(200, json!(self.captures.snapshot())),
        }
    }

    /// Raw NEC send with explicit bit length and repeat count
    pub fn send(&self, kind: Option<&str>, data: Option<&str>, length: Option<i64>, repeat: Option<i64>) -> WebResponse {
        let (Some(kind), Some(data)) = (kind, data) else {
            return WebResponse::text(400, "Missing type or data");
        };
        let length = length.unwrap_or(i64::from(timing::DEFAULT_BITS));
        let repeat = repeat.unwrap_or(1);

        if !(1..=i64::from(timing::SEND_LENGTH_MAX)).contains(&length) {
            return WebResponse::text(400, "Invalid length (1-128)");
        }
        if !(1..=i64::from(timing::SEND_REPEAT_MAX)).contains(&repeat) {
            return WebResponse::text(400, "Invalid repeat (1-20)");
        }
        if kind != "nec" {
            return WebResponse::text(400, "Unsupported type");
        }
        let Some(code) = parse_hex_code(data) else {
            return WebResponse::text(400, "Invalid hex data");
        };

        // Bounds checked above
        self.resolver.queue().queue(code, length as u16, repeat as i32);
        info!("[IR] TX NEC 0x{} {}b (no name)", data, length);
        WebResponse::text(200, format!("Sent NEC {}", data))
    }

    /// WebSocket send message; `None` when the message is ignored
    pub fn ws_send(&self, message: &str) -> Option<Value> {
        let req: Value = serde_json::from_str(message).ok()?;
        if req.get("cmd").and_then(Value::as_str) != Some("send") {
            return None;
        }
        let text = |key: &str| req.get(key).and_then(Value::as_str).unwrap_or("");
        let kind = text("type");
        let data = text("data");
        let name = text("name");
        let length = req
            .get("length")
            .and_then(Value::as_i64)
            .unwrap_or(i64::from(timing::DEFAULT_BITS));

        if kind != "nec" || data.is_empty() {
            return None;
        }
        let code = match parse_hex_code(data) {
            Some(code) if (1..=i64::from(timing::SEND_LENGTH_MAX)).contains(&length) => code,
            _ => return Some(json!({ "ok": false, "error": "Invalid hex data or length" })),
        };

        self.resolver.queue().queue(code, length as u16, 1);
        info!(
            "[IR] TX NEC 0x{} {}b ({})",
            data,
            length,
            if name.is_empty() { "no name" } else { name }
        );
        let mut ack = json!({ "ok": true, "msg": format!("Sent NEC {}", data) });
        if !name.is_empty() {
            ack["name"] = json!(name);
        }
        Some(ack)
    }

    /// Append one record from a JSON body
    pub async fn save(&self, body: &str) -> WebResponse {
        if body.len() > timing::SAVE_BODY_MAX {
            return WebResponse::error(413, "Payload too large");
        }
        let Ok(doc) = serde_json::from_str::<Value>(body) else {
            return WebResponse::error(400, "Invalid JSON");
        };
        let Some(value) = doc.get("value").and_then(Value::as_str) else {
            return WebResponse::error(400, "Missing value");
        };
        let name = doc.get("name").and_then(Value::as_str).unwrap_or("");
        let protocol = doc.get("protocol").and_then(Value::as_str).unwrap_or("UNKNOWN");
        let bits = match doc.get("bits").and_then(Value::as_u64) {
            Some(b) => u16::try_from(b).unwrap_or(0),
            None => timing::DEFAULT_BITS,
        };
        self.store_record(SavedCommand::new(name, protocol, value, bits)).await
    }

    /// Save the code given by `protocol`/`value`, or the latest capture when
    /// either is missing
    pub async fn save_last(
        &self,
        name: Option<&str>,
        protocol: Option<&str>,
        value: Option<&str>,
        length: Option<i64>,
    ) -> WebResponse {
        let name = name.unwrap_or("");
        let command = match (protocol, value) {
            (Some(protocol), Some(value)) => {
                let bits = length.map_or(timing::DEFAULT_BITS, |l| u16::try_from(l).unwrap_or(0));
                SavedCommand::new(name, protocol, value, bits)
            }
            _ => match self.captures.latest() {
                Some(capture) => capture.to_saved(name),
                None => return WebResponse::text(400, "No code to save; receive an IR code first."),
            },
        };
        self.store_record(command).await
    }

    async fn store_record(&self, command: SavedCommand) -> WebResponse {
        let name = command.name.clone();
        match self.resolver.store().with_saved(move |saved| saved.append(&command)).await {
            Ok(index) => {
                info!("[WEB] Saved #{} {:?}", index, name);
                WebResponse::json(200, json!({ "ok": true, "index": index, "total": index + 1 }))
            }
            Err(SavedError::Invalid(reason)) => WebResponse::error(400, reason),
            Err(SavedError::TooLarge(_)) => WebResponse::error(413, "Code too large"),
            Err(e) => storage_failure(e),
        }
    }

    /// Append every valid entry of a JSON array body
    pub async fn import(&self, body: &str) -> WebResponse {
        if body.len() > timing::IMPORT_BODY_MAX {
            return WebResponse::json(413, json!({ "ok": false, "error": "Payload too large" }));
        }
        let Ok(doc) = serde_json::from_str::<Value>(body) else {
            return WebResponse::json(400, json!({ "ok": false, "error": "Invalid JSON" }));
        };
        let Value::Array(items) = doc else {
            return WebResponse::json(400, json!({ "ok": false, "error": "Expected JSON array" }));
        };

        match self.resolver.store().with_saved(move |saved| saved.import(&items)).await {
            Ok(summary) => {
                info!(
                    "[WEB] Import: {} imported, {} skipped, {} total",
                    summary.imported, summary.skipped, summary.total
                );
                let mut out = json!(summary);
                out["ok"] = json!(true);
                WebResponse::json(200, out)
            }
            Err(e) => {
                warn!("[WEB] Import failed: {}", e);
                WebResponse::json(500, json!({ "ok": false, "error": "Storage unavailable" }))
            }
        }
    }

    /// Every record with its index
    pub async fn list(&self) -> WebResponse {
        match self.resolver.store().with_saved(|saved| saved.list()).await {
            Ok(entries) => WebResponse::json(200, json!(entries)),
            Err(e) => {
                warn!("[WEB] Listing failed: {}", e);
                WebResponse::json(200, json!([]))
            }
        }
    }

    pub async fn delete(&self, index: Option<i64>) -> WebResponse {
        let Some(index) = index else {
            return WebResponse::error(400, "Missing index");
        };
        let Ok(index) = usize::try_from(index) else {
            return WebResponse::error(400, "Invalid index");
        };

        match self.resolver.store().with_saved(move |saved| saved.delete(index)).await {
            Ok(remaining) => {
                info!("[WEB] Deleted #{}, {} remaining", index, remaining);
                WebResponse::json(200, json!({ "ok": true, "remaining": remaining }))
            }
            Err(SavedError::IndexOutOfRange { .. }) => WebResponse::error(400, "Invalid index"),
            Err(e) => storage_failure(e),
        }
    }

    pub async fn rename(&self, index: Option<i64>, name: Option<&str>) -> WebResponse {
        let (Some(index), Some(name)) = (index, name) else {
            return WebResponse::error(400, "Missing index or name");
        };
        let Ok(index) = usize::try_from(index) else {
            return WebResponse::error(400, "Invalid index");
        };

        let name = name.to_string();
        match self.resolver.store().with_saved(move |saved| saved.rename(index, &name)).await {
            Ok(()) => WebResponse::json(200, json!({ "ok": true, "index": index })),
            Err(SavedError::IndexOutOfRange { .. }) => WebResponse::error(400, "Invalid index"),
            Err(SavedError::Corrupt(_)) => WebResponse::error(500, "Stored code parse failed"),
            Err(SavedError::TooLarge(_)) => WebResponse::error(413, "Name too long"),
            Err(e) => storage_failure(e),
        }
    }

    /// Plain-text listing for hardcoding
    pub async fn dump(&self) -> WebResponse {
        match self.resolver.store().with_saved(|saved| saved.dump()).await {
            Ok(text) => WebResponse::text(200, text),
            Err(e) => {
                warn!("[WEB] Dump failed: {}", e);
                WebResponse::text(500, "Storage unavailable")
            }
        }
    }

    /// Send a saved command by index or name
    pub async fn send_saved(&self, target: CommandRef) -> WebResponse {
        match self.resolver.resolve_and_send(target).await {
            Ok(sent) => WebResponse::json(
                200,
                json!({ "ok": true, "index": sent.index, "name": sent.display_name() }),
            ),
            Err(ResolveError::NotFound(target)) => {
                WebResponse::error(404, &format!("Saved command {} not found", target))
            }
            Err(e @ (ResolveError::Unsupported { .. } | ResolveError::InvalidValue(_))) => {
                WebResponse::error(400, &e.to_string())
            }
            Err(ResolveError::Corrupt(_)) => WebResponse::error(500, "Stored code parse failed"),
            Err(ResolveError::Store(_)) => WebResponse::error(500, "Storage unavailable"),
        }
    }

    /// Remaining time of a running countdown
    pub async fn countdown(&self) -> WebResponse {
        let body = match self.schedule.countdown().await {
            Some(countdown) => json!({
                "active": true,
                "seconds": countdown.seconds_remaining,
                "command": countdown.command_name,
            }),
            None => json!({ "active": false }),
        };
        WebResponse::json(200, body)
    }

    /// Whether the dispatcher is working through a job
    pub fn transmitting(&self) -> WebResponse {
        let queue = self.resolver.queue();
        WebResponse::json(
            200,
            json!({ "transmitting": queue.is_active(), "pending": queue.has_pending() }),
        )
    }

    /// Sequence number and renderings of the latest capture
    pub fn last(&self) -> WebResponse {
        WebResponse::json(200, json!(self.captures.last()))
    }

    pub fn history(&self) -> WebResponse {
        let entries: Vec<Value> = self
            .captures
            .recent()
            .iter()
            .map(|c| {
                json!({
                    "protocol": c.protocol,
                    "value": c.value_hex(),
                    "bits": c.bits,
                    "human": c.human,
                    "replayUrl": c.replay_url().unwrap_or_default(),
                    "saveUrl": c.save_url(""),
                })
            })
            .collect();
        WebResponse::json(200, json!(entries))
    }

    /// Record a decoded frame as if the receiver had produced it
    pub fn receive(
        &self,
        protocol: Option<&str>,
        value: Option<&str>,
        bits: Option<i64>,
        human: Option<String>,
        raw: Option<String>,
    ) -> WebResponse {
        let (Some(protocol), Some(value)) = (protocol, value) else {
            return WebResponse::error(400, "Missing protocol or value");
        };
        let code = match u64::from_str_radix(value, 16) {
            Ok(code) if is_hex_value(value) => code,
            _ => return WebResponse::error(400, "Invalid hex data"),
        };
        let Ok(bits) = u16::try_from(bits.unwrap_or(i64::from(timing::DEFAULT_BITS))) else {
            return WebResponse::error(400, "Invalid length");
        };

        let mut capture = IrCapture::new(protocol, code, bits);
        if let Some(human) = human {
            capture.human = human;
        }
        if let Some(raw) = raw {
            capture.raw = raw;
        }
        let seq = self.captures.record(capture);
        WebResponse::json(200, json!({ "ok": true, "seq": seq }))
    }
}

fn storage_failure(e: SavedError) -> WebResponse {
    warn!("[WEB] Storage error: {}", e);
    match e {
        SavedError::Store(StoreError::Unavailable) => WebResponse::error(500, "Storage unavailable"),
        other => WebResponse::error(500, &other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreGuard;
    use crate::transport::StatusBoard;
    use irblaster_shared::{transmit_channel, IrTransmitter, MemoryStore, SavedCommands, TransmitPump};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Frames = Arc<Mutex<Vec<(u32, u16)>>>;

    fn setup() -> (WebApi, TransmitPump<impl IrTransmitter>, Frames) {
        let mut store = MemoryStore::new();
        {
            let mut saved = SavedCommands::new(&mut store);
            saved.append(&SavedCommand::new("Power", "NEC", "FF827D", 32)).unwrap();
            saved.append(&SavedCommand::new("Volume", "SONY", "490", 12)).unwrap();
        }
        let frames: Frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let (queue, pump) = transmit_channel(move |code: u32, bits: u16| {
            sink.lock().unwrap().push((code, bits));
        });
        let resolver = Resolver::new(StoreGuard::new(store, Duration::from_millis(100)), queue);
        let schedule = ScheduleMonitor::new(resolver.clone(), StatusBoard::new());
        (WebApi::new(resolver, schedule, CaptureFeed::default()), pump, frames)
    }

    fn body(response: &WebResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_send_validation() {
        let (api, mut pump, frames) = setup();

        assert_eq!(api.send(None, Some("FF"), None, None).body, "Missing type or data");
        assert_eq!(api.send(Some("nec"), Some("FF"), Some(0), None).body, "Invalid length (1-128)");
        assert_eq!(api.send(Some("nec"), Some("FF"), Some(129), None).status, 400);
        assert_eq!(api.send(Some("nec"), Some("FF"), None, Some(21)).body, "Invalid repeat (1-20)");
        assert_eq!(api.send(Some("sony"), Some("FF"), None, None).body, "Unsupported type");
        assert_eq!(api.send(Some("nec"), Some("0xFF"), None, None).body, "Invalid hex data");
        assert!(frames.lock().unwrap().is_empty());
        assert!(!api.resolver.queue().has_pending());

        let ok = api.send(Some("nec"), Some("FF827D"), Some(32), Some(3));
        assert_eq!(ok, WebResponse::text(200, "Sent NEC FF827D"));

        let mut now = 0;
        while pump.pump(now) {
            now += timing::INTER_FRAME_GAP_MS;
        }
        assert_eq!(frames.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ws_send() {
        let (api, _pump, _frames) = setup();

        assert_eq!(api.ws_send("not json"), None);
        assert_eq!(api.ws_send(r#"{"cmd":"other"}"#), None);
        assert_eq!(api.ws_send(r#"{"cmd":"send","type":"nec","data":""}"#), None);

        assert_eq!(
            api.ws_send(r#"{"cmd":"send","type":"nec","data":"XYZ"}"#),
            Some(json!({ "ok": false, "error": "Invalid hex data or length" }))
        );
        assert_eq!(
            api.ws_send(r#"{"cmd":"send","type":"nec","data":"FF827D","name":"Power"}"#),
            Some(json!({ "ok": true, "msg": "Sent NEC FF827D", "name": "Power" }))
        );
        assert!(api.resolver.queue().has_pending());
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let (api, _pump, _frames) = setup();

        let saved = api.save(r#"{"name":"Mute","protocol":"NEC","value":"FF02FD"}"#).await;
        assert_eq!(saved.status, 200);
        assert_eq!(body(&saved), json!({ "ok": true, "index": 2, "total": 3 }));

        assert_eq!(api.save("{").await, WebResponse::error(400, "Invalid JSON"));
        assert_eq!(api.save(r#"{"name":"X"}"#).await, WebResponse::error(400, "Missing value"));
        assert_eq!(
            api.save(r#"{"value":"nothex"}"#).await,
            WebResponse::error(400, "Value must be hex")
        );
        assert_eq!(api.save(&"x".repeat(3000)).await.status, 413);

        let listed = body(&api.list().await);
        assert_eq!(listed.as_array().unwrap().len(), 3);
        assert_eq!(
            listed[2],
            json!({ "index": 2, "name": "Mute", "protocol": "NEC", "value": "FF02FD", "bits": 32 })
        );
    }

    #[tokio::test]
    async fn test_import_summary() {
        let (api, _pump, _frames) = setup();

        let response = api
            .import(r#"[{"name":"A","protocol":"NEC","value":"1"}, 5, {"name":"B","protocol":"NEC"}]"#)
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(
            body(&response),
            json!({
                "ok": true,
                "imported": 1,
                "skipped": 2,
                "errors": [
                    { "index": 1, "reason": "Entry is not an object" },
                    { "index": 2, "reason": "Missing value" }
                ],
                "total": 3
            })
        );

        assert_eq!(api.import(r#"{"a":1}"#).await.status, 400);
        assert_eq!(api.import("[").await.status, 400);
    }

    #[tokio::test]
    async fn test_delete_and_rename() {
        let (api, _pump, _frames) = setup();

        assert_eq!(api.rename(Some(1), Some("Vol")).await.status, 200);
        assert_eq!(api.rename(Some(9), Some("Vol")).await, WebResponse::error(400, "Invalid index"));
        assert_eq!(api.rename(Some(0), None).await, WebResponse::error(400, "Missing index or name"));
        assert_eq!(api.rename(Some(0), Some(&"n".repeat(600))).await.status, 413);

        assert_eq!(api.delete(None).await, WebResponse::error(400, "Missing index"));
        assert_eq!(api.delete(Some(-1)).await, WebResponse::error(400, "Invalid index"));
        let deleted = api.delete(Some(0)).await;
        assert_eq!(body(&deleted), json!({ "ok": true, "remaining": 1 }));

        let listed = body(&api.list().await);
        assert_eq!(listed[0]["name"], "Vol");
        assert_eq!(listed[0]["index"], 0);
    }

    #[tokio::test]
    async fn test_send_saved_by_name_and_index() {
        let (api, mut pump, frames) = setup();

        let response = api.send_saved(CommandRef::Name("POWER".into())).await;
        assert_eq!(body(&response), json!({ "ok": true, "index": 0, "name": "Power" }));
        pump.pump(0);
        assert_eq!(*frames.lock().unwrap(), vec![(0x00FF_827D, 32)]);

        assert_eq!(api.send_saved(CommandRef::Name("Input".into())).await.status, 404);
        assert_eq!(api.send_saved(CommandRef::Index(7)).await.status, 404);
        assert_eq!(api.send_saved(CommandRef::Index(1)).await.status, 400);

        let routed = api
            .handle(WebRequest::SendSaved {
                index: None,
                name: None,
            })
            .await;
        assert_eq!(routed, WebResponse::error(400, "Missing index or name"));
    }

    #[tokio::test]
    async fn test_dump_countdown_and_transmitting() {
        let (api, _pump, _frames) = setup();

        let dump = api.dump().await;
        assert_eq!(dump.content_type, TEXT);
        assert!(dump.body.contains("irsend.sendNEC(0xFF827Du, 32);  // Power"));

        assert_eq!(body(&api.countdown().await), json!({ "active": false }));
        api.schedule.arm(60, "Power").await.unwrap();
        let countdown = body(&api.countdown().await);
        assert_eq!(countdown["active"], true);
        assert_eq!(countdown["command"], "Power");

        assert_eq!(
            body(&api.transmitting()),
            json!({ "transmitting": false, "pending": false })
        );
    }

    #[tokio::test]
    async fn test_last_tracks_received_codes() {
        let (api, _pump, _frames) = setup();
        assert_eq!(
            body(&api.last()),
            json!({ "seq": 0, "human": "", "raw": "", "replayUrl": "" })
        );

        let received = api.receive(Some("NEC"), Some("FF827D"), None, Some("NEC 0xFF827D".into()), None);
        assert_eq!(body(&received), json!({ "ok": true, "seq": 1 }));
        let last = body(&api.last());
        assert_eq!(last["seq"], 1);
        assert_eq!(last["human"], "NEC 0xFF827D");
        assert_eq!(last["replayUrl"], "/send?type=nec&data=00FF827D&length=32");

        api.receive(Some("SONY"), Some("490"), Some(12), None, None);
        let last = body(&api.last());
        assert_eq!(last["seq"], 2);
        assert_eq!(last["replayUrl"], "");

        let history = body(&api.history());
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[0]["protocol"], "SONY");
        assert_eq!(history[1]["value"], "00FF827D");
        assert_eq!(history[1]["saveUrl"], "/save?protocol=NEC&value=00FF827D&length=32");

        assert_eq!(api.receive(None, Some("FF"), None, None, None).status, 400);
        assert_eq!(api.receive(Some("NEC"), Some("+FF"), None, None, None).status, 400);
        assert_eq!(api.receive(Some("NEC"), Some(&"F".repeat(17)), None, None, None).status, 400);
        assert_eq!(api.receive(Some("NEC"), Some("FF"), Some(70_000), None, None).status, 400);
        assert_eq!(body(&api.last())["seq"], 2);
    }

    #[tokio::test]
    async fn test_save_last_uses_latest_capture() {
        let (api, _pump, _frames) = setup();

        assert_eq!(
            api.save_last(Some("Mute"), None, None, None).await,
            WebResponse::text(400, "No code to save; receive an IR code first.")
        );

        api.receive(Some("NEC"), Some("FF02FD"), Some(32), None, None);
        api.receive(Some("NEC"), Some("FFA25D"), Some(32), None, None);
        let saved = api.save_last(Some("Mute"), None, None, None).await;
        assert_eq!(body(&saved), json!({ "ok": true, "index": 2, "total": 3 }));

        // Protocol without value still falls back to the capture
        let saved = api.save_last(None, Some("SONY"), None, None).await;
        assert_eq!(body(&saved), json!({ "ok": true, "index": 3, "total": 4 }));

        let explicit = api.save_last(Some("Vol"), Some("SONY"), Some("490"), Some(12)).await;
        assert_eq!(body(&explicit), json!({ "ok": true, "index": 4, "total": 5 }));

        let listed = body(&api.list().await);
        assert_eq!(
            listed[2],
            json!({ "index": 2, "name": "Mute", "protocol": "NEC", "value": "00FFA25D", "bits": 32 })
        );
        assert_eq!(listed[3]["name"], "");
        assert_eq!(listed[3]["value"], "00FFA25D");
        assert_eq!(
            listed[4],
            json!({ "index": 4, "name": "Vol", "protocol": "SONY", "value": "490", "bits": 12 })
        );
    }

    #[tokio::test]
    async fn test_save_last_reports_busy_storage() {
        let (api, _pump, _frames) = setup();
        api.receive(Some("NEC"), Some("FF02FD"), None, None, None);

        let _held = api.resolver.store().acquire().await.unwrap();
        assert_eq!(
            api.save_last(None, None, None, None).await,
            WebResponse::error(500, "Storage unavailable")
        );
    }

    #[tokio::test]
    async fn test_ws_connect_snapshot() {
        let (api, _pump, _frames) = setup();
        let empty = body(&api.handle(WebRequest::WsConnect).await);
        assert_eq!(empty, json!({ "event": "ir", "seq": 0, "human": "", "raw": "", "replayUrl": "" }));

        api.captures().record(IrCapture::new("NEC", 0xFF827D, 32));
        let snapshot = body(&api.handle(WebRequest::WsConnect).await);
        assert_eq!(snapshot["seq"], 1);
        assert_eq!(snapshot["protocol"], "NEC");
        assert_eq!(snapshot["value"], "00FF827D");
        assert_eq!(snapshot["bits"], 32);
    }

    #[test]
    fn test_request_wire_format() {
        let request: WebRequest =
            serde_json::from_str(r#"{"op":"send","type":"nec","data":"FF827D","repeat":2}"#).unwrap();
        assert_eq!(
            request,
            WebRequest::Send {
                kind: Some("nec".into()),
                data: Some("FF827D".into()),
                length: None,
                repeat: Some(2),
            }
        );
        let request: WebRequest = serde_json::from_str(r#"{"op":"send_saved","name":"Off"}"#).unwrap();
        assert_eq!(
            request,
            WebRequest::SendSaved {
                index: None,
                name: Some("Off".into()),
            }
        );
    }
}
