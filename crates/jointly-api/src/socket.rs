//! WebSocket transport to a telemetry bridge.
//!
//! [`BridgeSocket::open`] establishes exactly one connection and returns
//! a cheaply cloneable [`SocketHandle`]. Inbound frames are parsed and
//! fanned out through a [`tokio::sync::broadcast`] channel; outbound
//! operations go through an mpsc writer task; service calls are
//! correlated by id and resolved through oneshot channels.
//!
//! There is no automatic reconnect: a transport error is terminal for
//! the handle until the caller opens a new one. Changing the target URL
//! therefore always means "tear down fully, then open fresh"; partial
//! dual-connection states cannot occur.
//!
//! # Example
//!
//! ```rust,ignore
//! use jointly_api::socket::{BridgeSocket, SocketConfig};
//! use url::Url;
//!
//! let url = Url::parse("ws://192.168.123.4:9090")?;
//! let handle = BridgeSocket::open(&url, SocketConfig::default()).await?;
//! let mut frames = handle.frames();
//!
//! while let Ok(frame) = frames.recv().await {
//!     println!("{frame:?}");
//! }
//!
//! handle.close();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::{ClientOp, InboundFrame, ServerOp, parse_inbound};

// ── ConnectionStatus ─────────────────────────────────────────────────

/// Connection lifecycle state, observable by consumers.
///
/// Exactly one value is active at a time; transitions are driven only
/// by the socket layer. An `Error` transition is terminal for the
/// handle; the next `Disconnected` reflects the actual closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionStatus {
    /// Returns `true` when the connection is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

// ── SocketConfig ─────────────────────────────────────────────────────

/// Tuning knobs for one socket.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Deadline for the initial connect + handshake. Default: 10s.
    pub connect_timeout: Duration,

    /// Deadline for a service call round trip. Default: 10s.
    pub service_timeout: Duration,

    /// Inbound broadcast capacity (frames buffered per slow consumer
    /// before `Lagged`). Default: 256.
    pub frame_capacity: usize,

    /// Outbound queue depth. Default: 64.
    pub send_capacity: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            service_timeout: Duration::from_secs(10),
            frame_capacity: 256,
            send_capacity: 64,
        }
    }
}

// ── SocketHandle ─────────────────────────────────────────────────────

type PendingCalls = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, Error>>>>>;

/// Handle to one live bridge connection.
///
/// Clone freely: all clones share the same underlying connection.
/// Dropping every clone does not close the socket; call
/// [`close`](Self::close) for deterministic teardown.
#[derive(Clone)]
pub struct SocketHandle {
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    frame_tx: broadcast::Sender<Arc<InboundFrame>>,
    op_tx: mpsc::Sender<ClientOp>,
    pending: PendingCalls,
    cancel: CancellationToken,
    service_timeout: Duration,
}

/// Factory for bridge connections.
pub struct BridgeSocket;

impl BridgeSocket {
    /// Open one WebSocket connection to `url`.
    ///
    /// Publishes `Connecting` → `Connected` on the returned handle's
    /// status channel on success. On failure the status ends at
    /// `Error(..)` and the error is returned; no background retry.
    pub async fn open(url: &Url, config: SocketConfig) -> Result<SocketHandle, Error> {
        // Status writes use `send_replace` throughout: `send` does not
        // update the value when no receiver exists, and the handle must
        // report a truthful status before anyone calls `watch_status`.
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let status_tx = Arc::new(status_tx);
        status_tx.send_replace(ConnectionStatus::Connecting);

        tracing::info!(url = %url, "connecting to bridge");

        let connect = tokio_tungstenite::connect_async(url.as_str());
        let ws_stream = match tokio::time::timeout(config.connect_timeout, connect).await {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                status_tx.send_replace(ConnectionStatus::Error(e.to_string()));
                return Err(Error::WebSocketConnect(e.to_string()));
            }
            Err(_) => {
                let timeout_secs = config.connect_timeout.as_secs();
                status_tx.send_replace(ConnectionStatus::Error(format!(
                    "connect timed out after {timeout_secs}s"
                )));
                return Err(Error::ConnectTimeout { timeout_secs });
            }
        };

        tracing::info!("bridge connected");
        status_tx.send_replace(ConnectionStatus::Connected);

        let (frame_tx, _) = broadcast::channel(config.frame_capacity);
        let (op_tx, op_rx) = mpsc::channel(config.send_capacity);
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let (sink, stream) = ws_stream.split();

        tokio::spawn(writer_loop(
            sink,
            op_rx,
            Arc::clone(&status_tx),
            cancel.clone(),
        ));
        tokio::spawn(reader_loop(
            stream,
            frame_tx.clone(),
            Arc::clone(&status_tx),
            Arc::clone(&pending),
            cancel.clone(),
        ));

        Ok(SocketHandle {
            status_tx,
            frame_tx,
            op_tx,
            pending,
            cancel,
            service_timeout: config.service_timeout,
        })
    }
}

impl SocketHandle {
    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Get a new receiver for the inbound frame stream.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn frames(&self) -> broadcast::Receiver<Arc<InboundFrame>> {
        self.frame_tx.subscribe()
    }

    /// Queue one outbound operation.
    pub async fn send(&self, op: ClientOp) -> Result<(), Error> {
        self.op_tx
            .send(op)
            .await
            .map_err(|e| Error::Send(format!("writer gone: {e}")))
    }

    /// Invoke a remote service and await its response.
    ///
    /// The call is correlated by a generated uuid; the reader task
    /// resolves it when the matching `service_response` arrives. Times
    /// out after the configured service deadline.
    pub async fn call_service(&self, service: &str, args: Option<Value>) -> Result<Value, Error> {
        let id = format!("call:{service}:{}", Uuid::new_v4());
        let (response_tx, response_rx) = oneshot::channel();

        self.pending.lock().await.insert(id.clone(), response_tx);

        let sent = self
            .send(ClientOp::CallService {
                id: id.clone(),
                service: service.to_owned(),
                args,
            })
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.service_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::SocketClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::ServiceTimeout {
                    service: service.to_owned(),
                    timeout_secs: self.service_timeout.as_secs(),
                })
            }
        }
    }

    /// Tear down the connection. Idempotent.
    ///
    /// Cancels the reader and writer tasks; the reader publishes the
    /// final `Disconnected` status and fails every pending service
    /// call, so no callback fires after teardown completes.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once teardown has been requested.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Writer task ──────────────────────────────────────────────────────

async fn writer_loop<S>(
    mut sink: S,
    mut op_rx: mpsc::Receiver<ClientOp>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message> + Unpin,
    S::Error: fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            op = op_rx.recv() => {
                let Some(op) = op else { break };
                let json = match serde_json::to_string(&op) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize outbound op");
                        continue;
                    }
                };
                if let Err(e) = sink.send(tungstenite::Message::Text(json.into())).await {
                    tracing::warn!(error = %e, "bridge write failed");
                    status_tx.send_replace(ConnectionStatus::Error(e.to_string()));
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

// ── Reader task ──────────────────────────────────────────────────────

async fn reader_loop<S>(
    mut stream: S,
    frame_tx: broadcast::Sender<Arc<InboundFrame>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    pending: PendingCalls,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = stream.next() => {
                match message {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_frame(text.as_str(), &frame_tx, &pending).await;
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pongs automatically
                        tracing::trace!("bridge ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref close) = frame {
                            tracing::info!(code = %close.code, reason = %close.reason,
                                "bridge sent close frame");
                        } else {
                            tracing::info!("bridge sent close frame (no payload)");
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "bridge read failed");
                        status_tx.send_replace(ConnectionStatus::Error(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!("bridge stream ended");
                        break;
                    }
                    _ => {
                        // Binary, Pong, raw frames -- ignore
                    }
                }
            }
        }
    }

    // Actual closure: every error transition ends here, and teardown
    // must leave no dangling callbacks behind.
    cancel.cancel();
    fail_pending(&pending).await;
    status_tx.send_replace(ConnectionStatus::Disconnected);
    tracing::debug!("bridge reader exiting");
}

/// Route one inbound text frame: resolve service responses, fan out
/// everything else, drop malformed frames with a log line.
async fn dispatch_frame(
    text: &str,
    frame_tx: &broadcast::Sender<Arc<InboundFrame>>,
    pending: &PendingCalls,
) {
    let frame = match parse_inbound(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed frame");
            return;
        }
    };

    if let InboundFrame::Bridge(ServerOp::ServiceResponse {
        id: Some(ref id),
        ref values,
        result,
        ref service,
    }) = frame
    {
        if let Some(response_tx) = pending.lock().await.remove(id) {
            let outcome = if result == Some(false) {
                Err(Error::ServiceCall {
                    service: service.clone().unwrap_or_default(),
                    message: "bridge reported failure".into(),
                })
            } else {
                Ok(values.clone().unwrap_or(Value::Null))
            };
            let _ = response_tx.send(outcome);
            return;
        }
        tracing::debug!(id, "service response with no pending call");
        return;
    }

    // Ignore send errors -- just means no active consumers right now
    let _ = frame_tx.send(Arc::new(frame));
}

/// Fail every pending service call with `SocketClosed`.
async fn fail_pending(pending: &PendingCalls) {
    let mut map = pending.lock().await;
    for (_, response_tx) in map.drain() {
        let _ = response_tx.send(Err(Error::SocketClosed));
    }
}

// ── Tests ────────────────────────────────────────────────────────────
