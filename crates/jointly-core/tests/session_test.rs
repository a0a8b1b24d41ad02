// Integration tests for the session lifecycle against an in-process
// WebSocket bridge. The mock bridge records every operation it
// receives (in arrival order) and lets tests push frames to the client.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jointly_core::{
    BindingState, ConnectionStatus, CoreError, NeckCommand, Session, SessionConfig, ValueStream,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

// ── Mock bridge ──────────────────────────────────────────────────────

struct MockBridge {
    url: Url,
    ops: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<String>,
}

impl MockBridge {
    async fn spawn(topics: &[(&str, &str)]) -> Self {
        Self::spawn_inner(topics, true).await
    }

    /// Bridge whose directory service answers with `result: false`.
    async fn spawn_with_broken_directory() -> Self {
        Self::spawn_inner(&[], false).await
    }

    async fn spawn_inner(topics: &[(&str, &str)], directory_ok: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let url: Url = format!("ws://{addr}").parse().expect("valid url");

        let names: Vec<String> = topics.iter().map(|(n, _)| (*n).to_owned()).collect();
        let types: Vec<String> = topics.iter().map(|(_, t)| (*t).to_owned()).collect();

        let (ops_tx, ops) = mpsc::unbounded_channel();
        let (push, push_rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(listener, names, types, directory_ok, ops_tx, push_rx));

        Self { url, ops, push }
    }

    fn push_json(&self, value: &Value) {
        self.push.send(value.to_string()).expect("bridge alive");
    }

    /// Next operation the bridge received, in arrival order.
    async fn next_op(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.ops.recv())
            .await
            .expect("op within deadline")
            .expect("bridge alive")
    }

    /// Collect arriving operations until `pred` matches (inclusive).
    async fn ops_until(&mut self, pred: impl Fn(&Value) -> bool) -> Vec<Value> {
        let mut ops = Vec::new();
        loop {
            let op = self.next_op().await;
            let done = pred(&op);
            ops.push(op);
            if done {
                return ops;
            }
        }
    }
}

async fn serve(
    listener: TcpListener,
    names: Vec<String>,
    types: Vec<String>,
    directory_ok: bool,
    ops_tx: mpsc::UnboundedSender<Value>,
    mut push_rx: mpsc::UnboundedReceiver<String>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            continue;
        };

        loop {
            tokio::select! {
                message = ws.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(op) = serde_json::from_str::<Value>(text.as_str()) else {
                                continue;
                            };
                            let _ = ops_tx.send(op.clone());
                            if op["op"] == "call_service" && op["service"] == "/rosapi/topics" {
                                let reply = if directory_ok {
                                    json!({
                                        "op": "service_response",
                                        "id": op["id"],
                                        "service": "/rosapi/topics",
                                        "values": { "topics": names, "types": types },
                                        "result": true,
                                    })
                                } else {
                                    json!({
                                        "op": "service_response",
                                        "id": op["id"],
                                        "service": "/rosapi/topics",
                                        "result": false,
                                    })
                                };
                                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                pushed = push_rx.recv() => {
                    let Some(text) = pushed else { return };
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn test_config(url: &Url) -> SessionConfig {
    SessionConfig::new(url.clone()).with_timeout(WAIT)
}

async fn wait_for<T, F>(stream: &mut ValueStream<T>, mut pred: F) -> T
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(&T) -> bool,
{
    let current = stream.latest();
    if pred(&current) {
        return current;
    }
    loop {
        let value = tokio::time::timeout(WAIT, stream.changed())
            .await
            .expect("change within deadline")
            .expect("writer alive");
        if pred(&value) {
            return value;
        }
    }
}

fn state_frame(tick: u64) -> Value {
    json!({
        "joints": [
            { "name": "left_shoulder_pitch", "q": 0.5, "dq": 0.0, "tau_est": 0.1,
              "temperature": 31.0, "min": -1.0, "max": 1.0 }
        ],
        "tick": tick,
        "battery": 76.0,
        "cpu": 12.0,
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_advertises_command_topic_and_fetches_directory() {
    let mut bridge = MockBridge::spawn(&[("/odom", "nav_msgs/Odometry")]).await;
    let session = Session::new(test_config(&bridge.url));

    session.open().await.expect("open succeeds");
    assert!(session.status().is_connected());

    let advertise = bridge.next_op().await;
    assert_eq!(advertise["op"], "advertise");
    assert_eq!(advertise["topic"], "/neck_controller/command");
    assert_eq!(advertise["type"], "std_msgs/Float64MultiArray");

    let call = bridge.next_op().await;
    assert_eq!(call["op"], "call_service");
    assert_eq!(call["service"], "/rosapi/topics");

    let listing = session.directory().listing().expect("directory fetched");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "/odom");

    session.close().await;
}

#[tokio::test]
async fn open_subscribes_battery_listener() {
    let mut bridge =
        MockBridge::spawn(&[("/battery_state", "sensor_msgs/BatteryState")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    let ops = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/battery_state")
        .await;
    let subscribe = ops.last().expect("subscribe seen");
    assert_eq!(subscribe["type"], "sensor_msgs/BatteryState");

    bridge.push_json(&json!({
        "op": "publish",
        "topic": "/battery_state",
        "msg": { "percentage": 0.91, "voltage": 48.0 },
    }));

    let mut batteries = session.store().subscribe_battery();
    let battery = wait_for(&mut batteries, Option::is_some)
        .await
        .expect("battery stored");
    assert_eq!(battery.percentage, 0.91);

    session.close().await;
}

#[tokio::test]
async fn telemetry_frames_flow_into_store() {
    let mut bridge = MockBridge::spawn(&[]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");
    let _ = bridge.ops_until(|op| op["op"] == "subscribe").await;

    bridge.push_json(&state_frame(7));
    bridge.push_json(&state_frame(8));

    let mut states = session.store().subscribe_state();
    let state = wait_for(&mut states, |s| {
        s.as_ref().is_some_and(|s| s.tick >= 8)
    })
    .await
    .expect("snapshot stored");

    assert_eq!(state.tick, 8);
    let joint = state.joint("left_shoulder_pitch").expect("joint present");
    assert_eq!(joint.q, 0.5);
    assert_eq!(joint.position_ratio(), Some(0.75));

    session.close().await;
}

#[tokio::test]
async fn binder_binds_selection_and_delivers_messages() {
    let mut bridge = MockBridge::spawn(&[("/odom", "nav_msgs/Odometry")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    session.select_topic(Some("/odom".into()));

    let mut states = session.binder().subscribe_state();
    let bound = wait_for(&mut states, BindingState::is_bound).await;
    assert_eq!(
        bound,
        BindingState::Bound {
            topic: "/odom".into(),
            message_type: "nav_msgs/Odometry".into(),
        }
    );

    // Only push once the bridge has seen the subscribe.
    let _ = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/odom")
        .await;
    bridge.push_json(&json!({
        "op": "publish",
        "topic": "/odom",
        "msg": { "x": 3.5 },
    }));

    let mut latest = session.binder().subscribe_latest();
    let msg = wait_for(&mut latest, Option::is_some)
        .await
        .expect("message delivered");
    assert_eq!(msg["x"], 3.5);

    session.close().await;
}

#[tokio::test]
async fn directory_failure_yields_empty_listing() {
    let bridge = MockBridge::spawn_with_broken_directory().await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    // The failed fetch still publishes a listing, just an empty one.
    let listing = session.directory().listing().expect("listing published");
    assert!(listing.is_empty());

    // A selection against the empty listing is a hard miss rather than
    // an indefinite Resolving.
    session.select_topic(Some("/x".into()));
    let mut states = session.binder().subscribe_state();
    let state = wait_for(&mut states, |s| matches!(s, BindingState::Error { .. })).await;
    assert!(matches!(state, BindingState::Error { topic, .. } if topic == "/x"));

    session.close().await;
}

#[tokio::test]
async fn selecting_missing_topic_reports_error_state() {
    let bridge = MockBridge::spawn(&[("/a", "t1"), ("/b", "t2")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    session.select_topic(Some("/c".into()));

    let mut states = session.binder().subscribe_state();
    let state = wait_for(&mut states, |s| matches!(s, BindingState::Error { .. })).await;
    assert!(matches!(state, BindingState::Error { topic, .. } if topic == "/c"));

    session.close().await;
}

#[tokio::test]
async fn retarget_releases_old_subscription_first() {
    let mut bridge = MockBridge::spawn(&[("/a", "t1"), ("/b", "t2")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    session.select_topic(Some("/a".into()));
    let ops = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/a")
        .await;
    let subscribe_a = ops.last().expect("subscribe seen");
    let subscribe_a_id = subscribe_a["id"].clone();

    session.select_topic(Some("/b".into()));
    let ops = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/b")
        .await;

    // Exactly one release, arriving before the new subscribe, reusing
    // the id the old subscription was opened with.
    assert_eq!(ops.len(), 2, "expected unsubscribe then subscribe: {ops:?}");
    assert_eq!(ops[0]["op"], "unsubscribe");
    assert_eq!(ops[0]["topic"], "/a");
    assert_eq!(ops[0]["id"], subscribe_a_id);

    session.close().await;
}

#[tokio::test]
async fn reselecting_bound_topic_is_a_no_op() {
    let mut bridge = MockBridge::spawn(&[("/a", "t1")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    session.select_topic(Some("/a".into()));
    let _ = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/a")
        .await;

    session.select_topic(Some("/a".into()));

    // A neck command flushes the op stream; nothing binder-related
    // should precede it.
    session
        .publish_neck(NeckCommand::new(0.0, 0.0))
        .await
        .expect("publish succeeds");
    let ops = bridge.ops_until(|op| op["op"] == "publish").await;
    assert_eq!(ops.len(), 1, "no rebind traffic expected: {ops:?}");

    session.close().await;
}

#[tokio::test]
async fn publish_neck_sends_flat_float_array() {
    let mut bridge = MockBridge::spawn(&[]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");
    let _ = bridge.ops_until(|op| op["op"] == "subscribe").await;

    session
        .publish_neck(NeckCommand::new(0.3, -0.1))
        .await
        .expect("publish succeeds");

    let ops = bridge.ops_until(|op| op["op"] == "publish").await;
    let publish = ops.last().expect("publish seen");
    assert_eq!(publish["topic"], "/neck_controller/command");
    assert_eq!(publish["msg"], json!({ "data": [0.3, -0.1] }));

    session.close().await;
}

#[tokio::test]
async fn close_resets_all_reactive_state() {
    let mut bridge = MockBridge::spawn(&[("/a", "t1")]).await;
    let session = Session::new(test_config(&bridge.url));
    session.open().await.expect("open succeeds");

    session.select_topic(Some("/a".into()));
    let _ = bridge
        .ops_until(|op| op["op"] == "subscribe" && op["topic"] == "/a")
        .await;
    bridge.push_json(&state_frame(3));

    let mut states = session.store().subscribe_state();
    let _ = wait_for(&mut states, Option::is_some).await;

    session.close().await;

    // When close returns, every background task has exited and the
    // reactive surfaces are blank.
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert!(session.store().state().is_none());
    assert!(session.store().last_frame_at().is_none());
    assert!(session.directory().listing().is_none());
    assert_eq!(session.binder().state(), BindingState::Idle);
    assert!(session.binder().latest().is_none());

    // Selection survives teardown for the next connect.
    assert_eq!(session.binder().selection(), Some("/a".into()));
}

#[tokio::test]
async fn open_url_switches_bridges_cleanly() {
    let mut first = MockBridge::spawn(&[("/a", "t1")]).await;
    let mut second = MockBridge::spawn(&[("/b", "t2")]).await;

    let session = Session::new(test_config(&first.url));
    session.open().await.expect("first open succeeds");
    let _ = first.ops_until(|op| op["op"] == "subscribe").await;

    session
        .open_url(second.url.clone())
        .await
        .expect("second open succeeds");

    let advertise = second.next_op().await;
    assert_eq!(advertise["op"], "advertise");
    assert!(session.status().is_connected());

    let listing = session.directory().listing().expect("directory fetched");
    assert_eq!(listing[0].name, "/b");

    session.close().await;
}

#[tokio::test]
async fn open_against_dead_endpoint_reports_error_status() {
    // Bind then drop to get a port with no listener.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let url: Url = format!("ws://{addr}").parse().expect("valid url");
    let session = Session::new(SessionConfig::new(url).with_timeout(Duration::from_secs(2)));

    let result = session.open().await;
    assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
    assert!(matches!(session.status(), ConnectionStatus::Error(_)));
}
