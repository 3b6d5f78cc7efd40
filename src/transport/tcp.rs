//! TCP listeners for the web channel and the simulated wireless link
//!
//! Both speak newline-delimited JSON. A web connection that sends
//! `{"op":"ws_connect"}` also receives every later capture as a line. The
//! wireless simulation serves one client at a time, mirroring a
//! single-connection GATT server:
//!
//! ```text
//! > {"op":"read","uuid":"e97a0004-..."}         < {"value":"READY"}
//! > {"op":"write","uuid":"e97a0003-...","byte":0}
//!                                               < {"notify":"OK:Power"}
//! ```

use super::ble::BleAdapter;
use irblaster_shared::CaptureEvent;
use super::events::{Characteristic, TransportEvent};
use super::status::StatusBoard;
use super::web::{WebApi, WebRequest, WebResponse};
use anyhow::Result;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// One line from a simulated wireless client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
enum LinkRequest {
    Read {
        uuid: String,
    },
    Write {
        uuid: String,
        #[serde(default)]
        data: String,
        byte: Option<u8>,
    },
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Wireless link in TCP simulation mode
pub struct TcpLink {
    listener: TcpListener,
    events: mpsc::Sender<TransportEvent>,
    adapter: BleAdapter,
    status: StatusBoard,
}

impl TcpLink {
    /// Bind the link. Writes and link events go to `events`; reads are served by `adapter`.
    pub async fn bind(
        addr: &str,
        events: mpsc::Sender<TransportEvent>,
        adapter: BleAdapter,
        status: StatusBoard,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            events,
            adapter,
            status,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients one after another until the event consumer goes away
    pub async fn run(self) -> Result<()> {
        loop {
            info!("[BLE] Advertising (simulated) on {}", self.listener.local_addr()?);
            let (stream, addr) = self.listener.accept().await?;
            debug!("[BLE] Link from {}", addr);

            if self.events.send(TransportEvent::Connected).await.is_err() {
                break;
            }
            if let Err(e) = self.serve(stream).await {
                warn!("[BLE] Link error from {}: {}", addr, e);
            }
            if self.events.send(TransportEvent::disconnected_now()).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn serve(&self, stream: TcpStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let mut notifications = self.status.subscribe();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(());
                    };
                    if let Some(reply) = self.on_line(&line).await {
                        write_line(&mut writer, &reply).await?;
                    }
                }
                changed = notifications.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let text = notifications.borrow_and_update().clone();
                    write_line(&mut writer, &json!({ "notify": text }).to_string()).await?;
                }
            }
        }
    }

    async fn on_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let request: LinkRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => return Some(json!({ "error": e.to_string() }).to_string()),
        };

        match request {
            LinkRequest::Read { uuid } => {
                let Some(characteristic) = Characteristic::from_uuid(&uuid) else {
                    return Some(json!({ "error": "unknown characteristic" }).to_string());
                };
                let value = self.adapter.read(characteristic).await;
                Some(json!({ "value": String::from_utf8_lossy(&value) }).to_string())
            }
            LinkRequest::Write { uuid, data, byte } => {
                let Some(characteristic) = Characteristic::from_uuid(&uuid) else {
                    return Some(json!({ "error": "unknown characteristic" }).to_string());
                };
                let payload = match byte {
                    Some(b) => Bytes::from(vec![b]),
                    None => Bytes::from(data),
                };
                let event = TransportEvent::Written {
                    characteristic,
                    payload,
                };
                if self.events.send(event).await.is_err() {
                    warn!("[BLE] Event consumer gone, dropping write");
                }
                None
            }
        }
    }
}

/// Web channel listener: one JSON request per line, one JSON response per line
pub struct WebListener {
    listener: TcpListener,
    api: WebApi,
}

impl WebListener {
    pub async fn bind(addr: &str, api: WebApi) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, api })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        info!("[WEB] Listening on {}", self.listener.local_addr()?);
        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("[WEB] Connection from {}", addr);

            let api = self.api.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_web(stream, api).await {
                    warn!("[WEB] Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn serve_web(stream: TcpStream, api: WebApi) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut captures = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<WebRequest>(&line) {
                    Ok(request) => {
                        if request == WebRequest::WsConnect && captures.is_none() {
                            captures = Some(api.captures().subscribe());
                        }
                        api.handle(request).await
                    }
                    Err(_) => WebResponse::text(404, "Not found"),
                };
                write_line(&mut writer, &serde_json::to_string(&response)?).await?;
            }
            event = next_capture(&mut captures) => match event {
                Some(event) => write_line(&mut writer, &serde_json::to_string(&event)?).await?,
                None => captures = None,
            },
        }
    }
}

/// Next capture for a live client; pends forever when not subscribed
async fn next_capture(captures: &mut Option<broadcast::Receiver<CaptureEvent>>) -> Option<CaptureEvent> {
    let Some(rx) = captures.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("[WEB] Live client missed {} captures", missed);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
