//! Ethereum JSON-RPC over WebSocket.

use super::{
    Session, SessionEvent, SessionEventSender, SessionEventReceiver, Transport, TransportError,
    session_event_channel,
};
use crate::events::RawLog;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// Close code reported when the socket ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported for a close frame without a payload.
const NO_STATUS: u16 = 1005;

/// Opens WebSocket sessions to a node endpoint.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Session = WsSession;

    async fn open(&self) -> Result<(WsSession, SessionEventReceiver), TransportError> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        let (sink, stream) = stream.split();
        let (events_tx, events_rx) = session_event_channel();

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(stream, pending.clone(), open.clone(), events_tx));

        debug!(url = %self.url, "WebSocket session opened");

        let session = WsSession {
            sink: Arc::new(Mutex::new(sink)),
            pending,
            next_id: AtomicU64::new(1),
            open,
            reader,
        };
        Ok((session, events_rx))
    }
}

/// A JSON-RPC session over one WebSocket connection.
pub struct WsSession {
    sink: Arc<Mutex<WsSink>>,
    pending: PendingRequests,
    next_id: AtomicU64,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl WsSession {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self
            .sink
            .lock()
            .await
            .send(Message::Text(body.to_string()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        rx.await.map_err(|_| TransportError::ConnectionClosed)?
    }
}

#[async_trait]
impl Session for WsSession {
    async fn subscribe_logs(&self, address: Address) -> Result<String, TransportError> {
        let filter = json!({ "address": address.to_string().to_lowercase() });
        let result = self.request("eth_subscribe", json!(["logs", filter])).await?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Malformed(format!("subscription id: {result}")))
    }

    async fn probe(&self) -> Result<u64, TransportError> {
        let result = self.request("eth_chainId", json!([])).await?;
        result
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| TransportError::Malformed(format!("chain id: {result}")))
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Vec::new()))
            .await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Release);
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client closing".into(),
        };
        if let Err(e) = self.sink.lock().await.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "Close frame not sent");
        }
        self.reader.abort();
        fail_pending(&self.pending).await;
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcErrorObject>,
    method: Option<String>,
    params: Option<SubscriptionParams>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    #[allow(dead_code)]
    subscription: String,
    result: Value,
}

/// Log object as delivered by `eth_subscription`.
///
/// Every field is optional here; [`log_from_wire`] decides what a missing or
/// bad field means.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawLogWire {
    address: Option<String>,
    topics: Vec<Value>,
    data: Option<String>,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    removed: bool,
}

/// Convert a wire log, keeping whatever parses.
///
/// Faults are collected into `RawLog::malformed` so the decoder reports the
/// log as unrecognized instead of it being lost.
fn log_from_wire(wire: RawLogWire) -> RawLog {
    let mut faults = Vec::new();

    let address = match wire.address.as_deref() {
        Some(raw) => Address::from_str(raw).unwrap_or_else(|_| {
            faults.push(format!("invalid address {raw:?}"));
            Address::ZERO
        }),
        None => {
            faults.push("missing address".to_string());
            Address::ZERO
        }
    };

    let mut topics = SmallVec::new();
    for topic in &wire.topics {
        match topic.as_str().and_then(|t| B256::from_str(t).ok()) {
            Some(topic) => topics.push(topic),
            None => {
                faults.push(format!("invalid topic {topic}"));
                break;
            }
        }
    }

    let data = match wire.data.as_deref() {
        Some(raw) => Bytes::from_str(raw).unwrap_or_else(|_| {
            faults.push(format!("invalid data {raw:?}"));
            Bytes::new()
        }),
        None => {
            faults.push("missing data".to_string());
            Bytes::new()
        }
    };

    // Both are null for pending logs.
    let block_number = wire
        .block_number
        .as_deref()
        .map_or(0, |raw| {
            parse_quantity(raw).unwrap_or_else(|| {
                faults.push(format!("invalid blockNumber {raw:?}"));
                0
            })
        });
    let transaction_hash = wire
        .transaction_hash
        .as_deref()
        .map_or(B256::ZERO, |raw| {
            B256::from_str(raw).unwrap_or_else(|_| {
                faults.push(format!("invalid transactionHash {raw:?}"));
                B256::ZERO
            })
        });

    RawLog {
        address,
        topics,
        data,
        block_number,
        transaction_hash,
        removed: wire.removed,
        malformed: (!faults.is_empty()).then(|| faults.join(", ")),
    }
}

/// Parse a JSON-RPC hex quantity such as `0x2105`.
fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

async fn fail_pending(pending: &PendingRequests) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(TransportError::ConnectionClosed));
    }
}

/// The peer went away without a closing handshake.
fn is_abrupt_close(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Io(_)
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: PendingRequests,
    open: Arc<AtomicBool>,
    events_tx: SessionEventSender,
) {
    while let Some(message) = stream.next().await {
        let event = match message {
            Ok(Message::Text(text)) => handle_text(&text, &pending).await,
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                SessionEvent::Activity
            }
            Ok(Message::Frame(_)) => continue,
            Ok(Message::Close(frame)) => {
                open.store(false, Ordering::Release);
                fail_pending(&pending).await;
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.into_owned()))
                    .unwrap_or((NO_STATUS, String::new()));
                let _ = events_tx.send(SessionEvent::Closed { code, reason }).await;
                return;
            }
            Err(e) => {
                open.store(false, Ordering::Release);
                fail_pending(&pending).await;
                let event = if is_abrupt_close(&e) {
                    SessionEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: e.to_string(),
                    }
                } else {
                    SessionEvent::Error(e.to_string())
                };
                let _ = events_tx.send(event).await;
                return;
            }
        };

        if events_tx.send(event).await.is_err() {
            // Nobody is listening anymore.
            return;
        }
    }

    open.store(false, Ordering::Release);
    fail_pending(&pending).await;
    let _ = events_tx
        .send(SessionEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection dropped".to_string(),
        })
        .await;
}

async fn handle_text(text: &str, pending: &PendingRequests) -> SessionEvent {
    let message: RpcMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Ignoring unparseable message from node");
            return SessionEvent::Activity;
        }
    };

    if message.method.as_deref() == Some("eth_subscription") {
        let Some(params) = message.params else {
            warn!("eth_subscription notification without params");
            return SessionEvent::Activity;
        };
        let log = match serde_json::from_value::<RawLogWire>(params.result) {
            Ok(wire) => log_from_wire(wire),
            Err(e) => RawLog {
                malformed: Some(format!("log object: {e}")),
                ..RawLog::default()
            },
        };
        if let Some(fault) = &log.malformed {
            warn!(tx_hash = %log.transaction_hash, %fault, "Malformed log notification");
        }
        return SessionEvent::Log(log);
    }

    if let Some(id) = message.id {
        let response = match message.error {
            Some(err) => Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(message.result.unwrap_or(Value::Null)),
        };
        match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!(id, "Response for unknown request id"),
        }
    }

    SessionEvent::Activity
}
