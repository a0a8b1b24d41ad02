//! Bridge wire protocol: JSON operation envelopes.
//!
//! The bridge speaks a rosbridge-style protocol where every operation is
//! a JSON object tagged by an `op` field. Inbound traffic additionally
//! carries bare telemetry frames (no `op` field) from simpler producers;
//! [`parse_inbound`] unifies the two dialects into one [`InboundFrame`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::frame::{self, RobotState};

// ── Outbound operations ──────────────────────────────────────────────

/// A client-to-bridge operation.
///
/// Every op carries a client-generated `id` so responses (and bridge
/// logs) can be correlated with the request that caused them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    /// Open a subscription to `topic`.
    Subscribe {
        id: String,
        topic: String,
        #[serde(rename = "type")]
        message_type: String,
    },
    /// Release a subscription previously opened with the same `id`.
    Unsubscribe { id: String, topic: String },
    /// Announce intent to publish on `topic`.
    Advertise {
        id: String,
        topic: String,
        #[serde(rename = "type")]
        message_type: String,
    },
    /// Withdraw a previous advertisement.
    Unadvertise { id: String, topic: String },
    /// Publish one message to `topic`. Fire-and-forget.
    Publish { id: String, topic: String, msg: Value },
    /// Invoke a remote service; the bridge replies with a
    /// [`ServerOp::ServiceResponse`] carrying the same `id`.
    CallService {
        id: String,
        service: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
}

impl ClientOp {
    /// The correlation id of this operation.
    pub fn id(&self) -> &str {
        match self {
            Self::Subscribe { id, .. }
            | Self::Unsubscribe { id, .. }
            | Self::Advertise { id, .. }
            | Self::Unadvertise { id, .. }
            | Self::Publish { id, .. }
            | Self::CallService { id, .. } => id,
        }
    }
}

// ── Inbound operations ───────────────────────────────────────────────

/// A bridge-to-client operation envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerOp {
    /// A message delivered on a subscribed topic. The payload shape is
    /// per-channel and treated as opaque here.
    Publish { topic: String, msg: Value },

    /// Reply to a [`ClientOp::CallService`] with the matching `id`.
    ServiceResponse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        service: Option<String>,
        #[serde(default)]
        values: Option<Value>,
        #[serde(default)]
        result: Option<bool>,
    },
}

/// One parsed inbound frame: either a bridge envelope or a bare
/// telemetry snapshot.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Bridge(ServerOp),
    State(RobotState),
}

/// Classify and decode one inbound text frame.
///
/// Frames with an `op` field are bridge envelopes; everything else is
/// treated as a bare telemetry frame. Either way a malformed payload
/// yields [`Error::Decode`] for the caller to report and drop.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, Error> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::Decode {
        message: e.to_string(),
        body: text.to_owned(),
    })?;

    if value.get("op").is_some() {
        let op = serde_json::from_value(value).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: text.to_owned(),
        })?;
        return Ok(InboundFrame::Bridge(op));
    }

    frame::decode_state(text).map(InboundFrame::State)
}

// ── Topic listing service ────────────────────────────────────────────

/// Well-known directory service exposed by the bridge.
pub const TOPICS_SERVICE: &str = "/rosapi/topics";

/// Response payload of [`TOPICS_SERVICE`]: parallel arrays of channel
/// names and schema identifiers, correlated by index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicsResponse {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn subscribe_serializes_with_op_tag() {
        let op = ClientOp::Subscribe {
            id: "sub-1".into(),
            topic: "/battery_state".into(),
            message_type: "sensor_msgs/BatteryState".into(),
        };
        let json: Value = serde_json::to_value(&op).expect("serialize");
        assert_eq!(json["op"], "subscribe");
        assert_eq!(json["topic"], "/battery_state");
        assert_eq!(json["type"], "sensor_msgs/BatteryState");
    }

    #[test]
    fn call_service_omits_empty_args() {
        let op = ClientOp::CallService {
            id: "call-1".into(),
            service: TOPICS_SERVICE.into(),
            args: None,
        };
        let json = serde_json::to_string(&op).expect("serialize");
        assert!(!json.contains("args"), "args should be omitted: {json}");
    }

    #[test]
    fn publish_payload_round_trips() {
        let op = ClientOp::Publish {
            id: "pub-1".into(),
            topic: "/neck_controller/command".into(),
            msg: serde_json::json!({ "data": [0.3, -0.1] }),
        };
        let json: Value = serde_json::to_value(&op).expect("serialize");
        assert_eq!(json["op"], "publish");
        assert_eq!(json["msg"]["data"][0], 0.3);
    }

    #[test]
    fn parse_inbound_publish_envelope() {
        let text = r#"{"op":"publish","topic":"/odom","msg":{"x":1.0}}"#;
        match parse_inbound(text).expect("should parse") {
            InboundFrame::Bridge(ServerOp::Publish { topic, msg }) => {
                assert_eq!(topic, "/odom");
                assert_eq!(msg["x"], 1.0);
            }
            other => panic!("expected publish envelope, got: {other:?}"),
        }
    }

    #[test]
    fn parse_inbound_service_response() {
        let text = r#"{"op":"service_response","id":"call-9","service":"/rosapi/topics",
                       "values":{"topics":["/a"],"types":["t1"]},"result":true}"#;
        match parse_inbound(text).expect("should parse") {
            InboundFrame::Bridge(ServerOp::ServiceResponse {
                id,
                values,
                result,
                ..
            }) => {
                assert_eq!(id.as_deref(), Some("call-9"));
                assert_eq!(result, Some(true));
                let topics: TopicsResponse =
                    serde_json::from_value(values.expect("values")).expect("decode");
                assert_eq!(topics.topics, vec!["/a"]);
                assert_eq!(topics.types, vec!["t1"]);
            }
            other => panic!("expected service response, got: {other:?}"),
        }
    }

    #[test]
    fn parse_inbound_bare_telemetry() {
        let text = r#"{"joints":[],"tick":7,"battery":50.0,"cpu":20.0}"#;
        match parse_inbound(text).expect("should parse") {
            InboundFrame::State(state) => assert_eq!(state.tick, 7),
            other => panic!("expected telemetry state, got: {other:?}"),
        }
    }

    #[test]
    fn parse_inbound_unknown_op_is_decode_error() {
        let err = parse_inbound(r#"{"op":"fragment_start"}"#).expect_err("must fail");
        assert!(err.is_decode());
    }

    #[test]
    fn parse_inbound_garbage_is_decode_error() {
        let err = parse_inbound("}{").expect_err("must fail");
        assert!(err.is_decode());
    }
}
