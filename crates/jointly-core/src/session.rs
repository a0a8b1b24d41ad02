// ── Bridge session ──
//
// Owns one bridge connection end to end: the socket handle, the ingest
// task feeding the telemetry store, the directory fetch, and the
// binder task. `open` and `close` serialize on the connection mutex so
// a URL change is always a full teardown followed by a fresh connect.

use std::collections::HashSet;
use std::sync::Arc;

use jointly_api::protocol::{
    ClientOp, InboundFrame, ServerOp, TOPICS_SERVICE, TopicsResponse,
};
use jointly_api::{BatteryState, BridgeSocket, ConnectionStatus, SocketHandle};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::binder::{self, TopicBinder};
use crate::command::NeckCommand;
use crate::config::{DEFAULT_BATTERY_TYPE, SessionConfig};
use crate::directory::{TopicDescriptor, TopicDirectory, zip_topics};
use crate::error::CoreError;
use crate::store::TelemetryStore;

// ── Connection ───────────────────────────────────────────────────────

/// One live connection: the socket handle, the background tasks bound
/// to its lifetime, and the topics advertised on it.
struct Connection {
    handle: SocketHandle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    advertised: HashSet<String>,
}

// ── Session ──────────────────────────────────────────────────────────

struct SessionInner {
    config: Mutex<SessionConfig>,
    connection: Mutex<Option<Connection>>,
    store: Arc<TelemetryStore>,
    directory: Arc<TopicDirectory>,
    binder: TopicBinder,
}

/// Reactive session over one telemetry bridge.
///
/// Cheaply cloneable; all clones share the same connection, store, and
/// binder. At most one connection is live at a time. There is no
/// automatic reconnect: after a transport error the status stays at
/// `Error(..)` until the caller opens again.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config: Mutex::new(config),
                connection: Mutex::new(None),
                store: Arc::new(TelemetryStore::new()),
                directory: Arc::new(TopicDirectory::new()),
                binder: TopicBinder::new(),
            }),
        }
    }

    // ── Reactive surfaces ────────────────────────────────────────────

    /// The telemetry store (status, latest snapshot, battery).
    pub fn store(&self) -> &TelemetryStore {
        &self.inner.store
    }

    /// The topic directory for this session.
    pub fn directory(&self) -> &TopicDirectory {
        &self.inner.directory
    }

    /// The dynamic subscription binder.
    pub fn binder(&self) -> &TopicBinder {
        &self.inner.binder
    }

    /// Shorthand for the current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.store.status()
    }

    /// The currently configured bridge endpoint.
    pub async fn url(&self) -> Url {
        self.inner.config.lock().await.url.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect to the configured endpoint.
    ///
    /// Any existing connection is fully torn down first. On success the
    /// command topic is advertised, the directory is fetched, the
    /// battery listener (if configured) is subscribed, and the binder
    /// re-resolves whatever topic was selected.
    pub async fn open(&self) -> Result<(), CoreError> {
        let config = self.inner.config.lock().await.clone();
        let mut guard = self.inner.connection.lock().await;
        self.teardown(&mut guard).await;

        self.inner.store.set_status(ConnectionStatus::Connecting);

        let handle = match BridgeSocket::open(&config.url, config.socket.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                let reason = e.to_string();
                self.inner
                    .store
                    .set_status(ConnectionStatus::Error(reason.clone()));
                return Err(CoreError::ConnectionFailed {
                    url: config.url.to_string(),
                    reason,
                });
            }
        };

        self.inner.store.set_status(ConnectionStatus::Connected);

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let mut advertised = HashSet::new();

        tasks.push(tokio::spawn(ingest_loop(
            handle.clone(),
            Arc::clone(&self.inner.store),
            config.battery_topic.clone(),
            cancel.clone(),
        )));

        // Advertise the command channel up front so publishes are valid
        // for the whole life of the connection.
        let advertise = handle
            .send(ClientOp::Advertise {
                id: format!("adv:{}:{}", config.command_topic, Uuid::new_v4()),
                topic: config.command_topic.clone(),
                message_type: config.command_type.clone(),
            })
            .await;
        match advertise {
            Ok(()) => {
                advertised.insert(config.command_topic.clone());
            }
            Err(e) => {
                tracing::warn!(error = %e, topic = %config.command_topic,
                    "command topic advertisement failed");
            }
        }

        // One directory fetch per connection. A failed fetch publishes
        // an empty listing so selections resolve to a hard miss instead
        // of parking in Resolving; refresh_topics() can retry later.
        if let Err(e) = fetch_directory(&handle, &self.inner.directory).await {
            tracing::warn!(error = %e, "directory fetch failed");
            self.inner.directory.set(Vec::new());
        }

        if let Some(battery_topic) = &config.battery_topic {
            let message_type = self
                .inner
                .directory
                .lookup(battery_topic)
                .map(|t| t.message_type)
                .unwrap_or_else(|| DEFAULT_BATTERY_TYPE.to_owned());
            let subscribed = handle
                .send(ClientOp::Subscribe {
                    id: format!("sub:{battery_topic}:{}", Uuid::new_v4()),
                    topic: battery_topic.clone(),
                    message_type,
                })
                .await;
            if let Err(e) = subscribed {
                tracing::warn!(error = %e, topic = %battery_topic,
                    "battery subscription failed");
            }
        }

        tasks.push(tokio::spawn(binder::run_binder(
            handle.clone(),
            self.inner.binder.clone(),
            self.inner.directory.watch(),
            cancel.clone(),
        )));

        *guard = Some(Connection {
            handle,
            cancel,
            tasks,
            advertised,
        });
        Ok(())
    }

    /// Point the session at a new endpoint and connect.
    ///
    /// Equivalent to close-then-open; partial dual-connection states
    /// cannot occur.
    pub async fn open_url(&self, url: Url) -> Result<(), CoreError> {
        self.inner.config.lock().await.url = url;
        self.open().await
    }

    /// Tear down the connection and clear all reactive state.
    ///
    /// Idempotent. When this returns, every background task has exited
    /// and no further store or binder update can occur.
    pub async fn close(&self) {
        let mut guard = self.inner.connection.lock().await;
        self.teardown(&mut guard).await;
    }

    async fn teardown(&self, guard: &mut Option<Connection>) {
        let Some(connection) = guard.take() else {
            return;
        };

        connection.cancel.cancel();
        connection.handle.close();
        // Dropping the handle releases the frame/status senders so the
        // ingest and binder tasks observe closure even if they were
        // blocked on recv rather than the cancel token.
        drop(connection.handle);
        for task in connection.tasks {
            let _ = task.await;
        }

        self.inner.store.reset();
        self.inner.directory.reset();
        self.inner.binder.reset();
        tracing::debug!("session torn down");
    }

    // ── Directory ────────────────────────────────────────────────────

    /// Re-query the bridge's topic listing.
    pub async fn refresh_topics(&self) -> Result<Arc<Vec<TopicDescriptor>>, CoreError> {
        let handle = self.handle().await?;
        let response = call_topics_service(&handle).await?;
        Ok(self.inner.directory.set(zip_topics(&response)))
    }

    // ── Subscription binding ─────────────────────────────────────────

    /// Select the topic the binder should follow, or `None` to release.
    pub fn select_topic(&self, topic: Option<String>) {
        self.inner.binder.select(topic);
    }

    // ── Publishing ───────────────────────────────────────────────────

    /// Publish one message to an advertised topic.
    ///
    /// Fails with [`CoreError::NotConnected`] when no connection is
    /// live and [`CoreError::NotAdvertised`] when the topic was never
    /// advertised on this connection.
    pub async fn publish(&self, topic: &str, msg: Value) -> Result<(), CoreError> {
        let guard = self.inner.connection.lock().await;
        let Some(connection) = guard.as_ref() else {
            return Err(CoreError::NotConnected);
        };
        if !connection.handle.status().is_connected() {
            return Err(CoreError::NotConnected);
        }
        if !connection.advertised.contains(topic) {
            return Err(CoreError::NotAdvertised {
                topic: topic.to_owned(),
            });
        }

        connection
            .handle
            .send(ClientOp::Publish {
                id: format!("pub:{topic}:{}", Uuid::new_v4()),
                topic: topic.to_owned(),
                msg,
            })
            .await?;
        Ok(())
    }

    /// Advertise an additional outbound topic on the live connection.
    pub async fn advertise(&self, topic: &str, message_type: &str) -> Result<(), CoreError> {
        let mut guard = self.inner.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Err(CoreError::NotConnected);
        };

        connection
            .handle
            .send(ClientOp::Advertise {
                id: format!("adv:{topic}:{}", Uuid::new_v4()),
                topic: topic.to_owned(),
                message_type: message_type.to_owned(),
            })
            .await?;
        connection.advertised.insert(topic.to_owned());
        Ok(())
    }

    /// Send a neck pose command to the configured command topic.
    pub async fn publish_neck(&self, command: NeckCommand) -> Result<(), CoreError> {
        let payload = command.to_payload()?;
        let topic = self.inner.config.lock().await.command_topic.clone();
        self.publish(&topic, payload).await
    }

    async fn handle(&self) -> Result<SocketHandle, CoreError> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.handle.clone())
            .ok_or(CoreError::NotConnected)
    }
}

// ── Directory fetch ──────────────────────────────────────────────────

async fn call_topics_service(handle: &SocketHandle) -> Result<TopicsResponse, CoreError> {
    let values = handle
        .call_service(TOPICS_SERVICE, None)
        .await
        .map_err(|e| CoreError::Directory {
            message: e.to_string(),
        })?;
    serde_json::from_value(values).map_err(|e| CoreError::Directory {
        message: format!("malformed listing: {e}"),
    })
}

async fn fetch_directory(
    handle: &SocketHandle,
    directory: &TopicDirectory,
) -> Result<(), CoreError> {
    let response = call_topics_service(handle).await?;
    let listing = directory.set(zip_topics(&response));
    tracing::info!(topics = listing.len(), "directory fetched");
    Ok(())
}

// ── Ingest task ──────────────────────────────────────────────────────

/// Forward socket status and frames into the store for the lifetime of
/// one connection.
async fn ingest_loop(
    handle: SocketHandle,
    store: Arc<TelemetryStore>,
    battery_topic: Option<String>,
    cancel: CancellationToken,
) {
    let mut status_rx = handle.watch_status();
    let mut frames = handle.frames();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                // The socket publishes Disconnected when the reader
                // exits, including after an error. The error is the
                // fact worth surfacing until the next open.
                if status == ConnectionStatus::Disconnected
                    && matches!(store.status(), ConnectionStatus::Error(_))
                {
                    continue;
                }
                store.set_status(status);
            }
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => ingest_frame(&store, battery_topic.as_deref(), &frame),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "ingest lagged behind frame stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ingest task exiting");
}

fn ingest_frame(store: &TelemetryStore, battery_topic: Option<&str>, frame: &InboundFrame) {
    match frame {
        InboundFrame::State(state) => {
            store.apply_frame(Arc::new(state.clone()));
        }
        InboundFrame::Bridge(ServerOp::Publish { topic, msg })
            if Some(topic.as_str()) == battery_topic =>
        {
            match serde_json::from_value::<BatteryState>(msg.clone()) {
                Ok(battery) => store.apply_battery(Arc::new(battery)),
                Err(e) => {
                    tracing::debug!(error = %e, topic = %topic,
                        "dropping malformed battery message");
                }
            }
        }
        InboundFrame::Bridge(_) => {}
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use jointly_api::{JointReading, RobotState};

    fn state_frame(tick: u64) -> InboundFrame {
        InboundFrame::State(RobotState {
            joints: vec![JointReading {
                name: "left_shoulder_pitch".into(),
                q: 0.5,
                dq: 0.0,
                tau_est: 0.1,
                temperature: 31.0,
                min: -1.0,
                max: 1.0,
            }],
            tick,
            battery: 76.0,
            cpu: 12.0,
        })
    }

    #[test]
    fn ingest_routes_state_frames_to_store() {
        let store = TelemetryStore::new();
        ingest_frame(&store, Some("/battery_state"), &state_frame(4));

        let state = store.state().expect("snapshot stored");
        assert_eq!(state.tick, 4);
        assert_eq!(state.joints[0].name, "left_shoulder_pitch");
    }

    #[test]
    fn ingest_routes_battery_messages() {
        let store = TelemetryStore::new();
        let frame = InboundFrame::Bridge(ServerOp::Publish {
            topic: "/battery_state".into(),
            msg: serde_json::json!({ "percentage": 0.82, "voltage": 47.1 }),
        });

        ingest_frame(&store, Some("/battery_state"), &frame);

        let battery = store.battery().expect("battery stored");
        assert_eq!(battery.percentage, 0.82);
    }

    #[test]
    fn ingest_ignores_unrelated_publishes() {
        let store = TelemetryStore::new();
        let frame = InboundFrame::Bridge(ServerOp::Publish {
            topic: "/odom".into(),
            msg: serde_json::json!({ "x": 1.0 }),
        });

        ingest_frame(&store, Some("/battery_state"), &frame);

        assert!(store.battery().is_none());
        assert!(store.state().is_none());
    }

    #[test]
    fn ingest_drops_malformed_battery_message() {
        let store = TelemetryStore::new();
        let frame = InboundFrame::Bridge(ServerOp::Publish {
            topic: "/battery_state".into(),
            msg: serde_json::json!("not an object"),
        });

        ingest_frame(&store, Some("/battery_state"), &frame);
        assert!(store.battery().is_none());
    }

    #[tokio::test]
    async fn publish_without_connection_is_not_connected() {
        let session = Session::new(SessionConfig::default());
        let result = session.publish("/x", serde_json::json!({})).await;
        assert!(matches!(result, Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn publish_neck_without_connection_is_not_connected() {
        let session = Session::new(SessionConfig::default());
        let result = session.publish_neck(NeckCommand::new(0.1, 0.2)).await;
        assert!(matches!(result, Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn close_without_connection_is_a_no_op() {
        let session = Session::new(SessionConfig::default());
        session.close().await;
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn refresh_topics_without_connection_fails() {
        let session = Session::new(SessionConfig::default());
        let result = session.refresh_topics().await;
        assert!(matches!(result, Err(CoreError::NotConnected)));
    }
}
