//! Home Assistant WebSocket command channel.
//!
//! Connects to `/api/websocket`, performs the `auth_required` → `auth` →
//! `auth_ok` handshake, then splits the socket into a writer task fed by
//! an unbounded channel and a reader task that correlates `result`
//! frames to pending commands by id and fans `event` frames out to
//! subscription callbacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use hassbridge_api::{Credentials, HubConnection, WsGateway, HubGateway};
//!
//! let creds = Credentials::long_lived("homeassistant.local:8123", token)?;
//! let conn = WsGateway::default().open(&creds).await?;
//! let states = conn.fetch_states().await?;
//! ```

mod compressed;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::auth::Credentials;
use crate::error::Error;
use crate::gateway::{EntityCallback, HubConnection, HubGateway, Subscription};
use crate::models::{EntityState, ServiceCatalog};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code used when the socket drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── WsGateway ────────────────────────────────────────────────────────

/// Opens [`WsConnection`]s. Every command on the resulting connection
/// is bounded by `request_timeout`, as is the connect + auth handshake.
#[derive(Debug, Clone)]
pub struct WsGateway {
    request_timeout: Duration,
}

impl WsGateway {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for WsGateway {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HubGateway for WsGateway {
    type Connection = WsConnection;

    async fn open(&self, credentials: &Credentials) -> Result<WsConnection, Error> {
        WsConnection::connect(credentials, self.request_timeout).await
    }
}

// ── Shared reader/writer state ───────────────────────────────────────

struct EntitySink {
    callback: EntityCallback,
    seen_first: AtomicBool,
}

struct Inflight {
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Result<Value, Error>>>,
    subscriptions: DashMap<u64, EntitySink>,
    closed: AtomicBool,
}

impl Inflight {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            subscriptions: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Route an `event` frame to its subscription.
    fn deliver(&self, subscription: u64, event: Value) {
        let (callback, first) = {
            let Some(sink) = self.subscriptions.get(&subscription) else {
                trace!(subscription, "event for unknown subscription");
                return;
            };
            let first = !sink.seen_first.swap(true, Ordering::AcqRel);
            (Arc::clone(&sink.callback), first)
        };

        match compressed::decode_event(event, first) {
            Ok(delivery) => callback(delivery),
            Err(e) => warn!(error = %e, subscription, "dropping undecodable entity event"),
        }
    }

    /// Fail every outstanding command and forget all subscriptions.
    fn shut_down(&self, code: u16, reason: &str) {
        self.closed.store(true, Ordering::Release);

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::WebSocketClosed {
                    code,
                    reason: reason.to_string(),
                }));
            }
        }
        self.subscriptions.clear();
    }
}

// ── WsConnection ─────────────────────────────────────────────────────

/// Authenticated WebSocket channel to one hub.
///
/// Dropping the connection cancels its background tasks.
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Message>,
    inflight: Arc<Inflight>,
    cancel: CancellationToken,
    request_timeout: Duration,
}

impl WsConnection {
    /// Connect, authenticate, and spawn the reader/writer tasks.
    pub async fn connect(credentials: &Credentials, request_timeout: Duration) -> Result<Self, Error> {
        let url = credentials.websocket_url()?;
        info!(url = %url, "connecting to Home Assistant");

        let handshake = async {
            let (mut stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            authenticate(&mut stream, credentials.token()).await?;
            Ok::<_, Error>(stream)
        };

        let stream = tokio::time::timeout(request_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: request_timeout.as_secs(),
            })??;

        let (write, read) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let inflight = Arc::new(Inflight::new());
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(write, outbound_rx, cancel.clone()));
        tokio::spawn(read_loop(read, Arc::clone(&inflight), cancel.clone()));

        Ok(Self {
            outbound,
            inflight,
            cancel,
            request_timeout,
        })
    }

    fn closed_error() -> Error {
        Error::WebSocketClosed {
            code: ABNORMAL_CLOSURE,
            reason: "connection closed".into(),
        }
    }

    /// Send a command with a fresh id and wait for its `result` frame.
    async fn send_command(&self, message: Map<String, Value>) -> Result<Value, Error> {
        let id = self.inflight.next_id();
        self.send_with_id(id, message).await
    }

    async fn send_with_id(&self, id: u64, mut message: Map<String, Value>) -> Result<Value, Error> {
        if self.inflight.is_closed() {
            return Err(Self::closed_error());
        }

        message.insert("id".into(), Value::from(id));
        let (tx, rx) = oneshot::channel();
        self.inflight.pending.insert(id, tx);

        // The reader may have shut down between the check above and the insert.
        if self.inflight.is_closed() {
            self.inflight.pending.remove(&id);
            return Err(Self::closed_error());
        }

        debug!(id, kind = ?message.get("type"), "sending command");
        let frame = Message::Text(Value::Object(message).to_string().into());
        if self.outbound.send(frame).is_err() {
            self.inflight.pending.remove(&id);
            return Err(Self::closed_error());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Self::closed_error()),
            Err(_) => {
                self.inflight.pending.remove(&id);
                Err(Error::Timeout {
                    timeout_secs: self.request_timeout.as_secs(),
                })
            }
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn command(kind: &str) -> Map<String, Value> {
    let mut message = Map::new();
    message.insert("type".into(), Value::String(kind.to_string()));
    message
}

fn decode<T: serde::de::DeserializeOwned>(what: &str, value: Value) -> Result<T, Error> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: format!("{what}: {e}"),
        body: raw,
    })
}

impl HubConnection for WsConnection {
    async fn fetch_states(&self) -> Result<Vec<EntityState>, Error> {
        let result = self.send_command(command("get_states")).await?;
        decode("get_states", result)
    }

    async fn subscribe_entities(&self, callback: EntityCallback) -> Result<Subscription, Error> {
        let id = self.inflight.next_id();
        // Register before sending so the initial snapshot cannot race the result frame.
        self.inflight.subscriptions.insert(
            id,
            EntitySink {
                callback,
                seen_first: AtomicBool::new(false),
            },
        );

        if let Err(e) = self.send_with_id(id, command("subscribe_entities")).await {
            self.inflight.subscriptions.remove(&id);
            return Err(e);
        }
        debug!(subscription = id, "subscribed to entity updates");

        let inflight = Arc::clone(&self.inflight);
        let outbound = self.outbound.clone();
        Ok(Subscription::new(id, move || {
            inflight.subscriptions.remove(&id);
            let message = json!({
                "id": inflight.next_id(),
                "type": "unsubscribe_events",
                "subscription": id,
            });
            // Fire and forget: the result frame has no pending entry and is ignored.
            let _ = outbound.send(Message::Text(message.to_string().into()));
        }))
    }

    async fn request(&self, kind: &str, payload: Map<String, Value>) -> Result<Value, Error> {
        let mut message = payload;
        message.insert("type".into(), Value::String(kind.to_string()));
        self.send_command(message).await
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> Result<(), Error> {
        let mut message = command("call_service");
        message.insert("domain".into(), Value::String(domain.to_string()));
        message.insert("service".into(), Value::String(service.to_string()));
        message.insert("service_data".into(), Value::Object(data));
        self.send_command(message).await?;
        Ok(())
    }

    async fn get_services(&self) -> Result<ServiceCatalog, Error> {
        let result = self.send_command(command("get_services")).await?;
        decode("get_services", result)
    }

    fn is_closed(&self) -> bool {
        self.inflight.is_closed()
    }

    fn close(&self) {
        self.cancel.cancel();
        self.inflight.closed.store(true, Ordering::Release);
    }
}

// ── Handshake ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ha_version: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn authenticate(stream: &mut WsStream, token: &SecretString) -> Result<(), Error> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| Error::WebSocketConnect(e.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };
        let msg: AuthMessage = serde_json::from_str(&text)
            .map_err(|e| Error::Protocol(format!("unexpected handshake frame: {e}")))?;

        match msg.kind.as_str() {
            "auth_required" => {
                debug!(
                    ha_version = msg.ha_version.as_deref().unwrap_or("unknown"),
                    "hub requested authentication"
                );
                let auth = json!({ "type": "auth", "access_token": token.expose_secret() });
                stream
                    .send(Message::Text(auth.to_string().into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            "auth_ok" => {
                info!(
                    ha_version = msg.ha_version.as_deref().unwrap_or("unknown"),
                    "authenticated with Home Assistant"
                );
                return Ok(());
            }
            "auth_invalid" => {
                return Err(Error::Authentication {
                    message: msg.message.unwrap_or_else(|| "invalid access token".into()),
                });
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected handshake message '{other}'"
                )));
            }
        }
    }

    Err(Error::WebSocketClosed {
        code: ABNORMAL_CLOSURE,
        reason: "closed during authentication".into(),
    })
}

// ── Background tasks ─────────────────────────────────────────────────

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(frame).await {
                    warn!(error = %e, "WebSocket write failed");
                    cancel.cancel();
                    break;
                }
            }
        }
    }
    trace!("WebSocket writer exiting");
}

async fn read_loop(mut read: SplitStream<WsStream>, inflight: Arc<Inflight>, cancel: CancellationToken) {
    let (code, reason) = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break (1000, "closed by client".to_string()),
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&text, &inflight),
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    trace!("WebSocket ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (ABNORMAL_CLOSURE, "close frame without payload".to_string()),
                        |cf| (u16::from(cf.code), cf.reason.to_string()),
                    );
                    info!(code, reason = %reason, "WebSocket close frame received");
                    break (code, reason);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
                Some(Ok(_)) => {}
            }
        }
    };

    inflight.shut_down(code, &reason);
    cancel.cancel();
    debug!(code, "WebSocket reader exiting");
}

// ── Frame dispatch ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<HubErrorBody>,
    #[serde(default)]
    event: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct HubErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Parse a text frame (single message or coalesced array) and route it.
fn dispatch(text: &str, inflight: &Inflight) {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => {
            for item in items {
                dispatch_one(item, inflight);
            }
        }
        Ok(item) => dispatch_one(item, inflight),
        Err(e) => debug!(error = %e, "ignoring non-JSON WebSocket frame"),
    }
}

fn dispatch_one(raw: Value, inflight: &Inflight) {
    let msg: Incoming = match serde_json::from_value(raw) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "ignoring malformed WebSocket message");
            return;
        }
    };

    match msg.kind.as_str() {
        "result" => {
            let Some(id) = msg.id else { return };
            let Some((_, tx)) = inflight.pending.remove(&id) else {
                trace!(id, "result for a command nobody is waiting on");
                return;
            };
            let outcome = if msg.success.unwrap_or(false) {
                Ok(msg.result.unwrap_or(Value::Null))
            } else {
                let err = msg.error.unwrap_or_default();
                Err(Error::HubRejected {
                    code: err.code,
                    message: err.message,
                })
            };
            let _ = tx.send(outcome);
        }
        "event" => {
            if let (Some(id), Some(event)) = (msg.id, msg.event) {
                inflight.deliver(id, event);
            }
        }
        "pong" => {}
        other => trace!(kind = other, "ignoring WebSocket message"),
    }
}
