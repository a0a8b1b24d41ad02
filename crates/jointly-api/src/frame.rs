//! Telemetry frame types and the pure frame decoder.
//!
//! A telemetry frame is one JSON message carrying the full robot state:
//! joint readings in producer order, a monotonic tick, and battery/CPU
//! percentages. Decoding is a pure function of one frame: malformed
//! input yields [`Error::Decode`] with the raw payload attached, never
//! a panic.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── JointReading ─────────────────────────────────────────────────────

/// One joint's reading within a telemetry snapshot.
///
/// Names follow a `side_joint` convention (e.g. `left_shoulder_pitch`)
/// and are unique within a snapshot by producer contract. `min < max`
/// is assumed but not verified here; consumers must tolerate the
/// degenerate `min == max` case (see [`JointReading::position_ratio`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointReading {
    pub name: String,
    /// Position (rad or normalized, per joint).
    pub q: f64,
    /// Velocity.
    pub dq: f64,
    /// Estimated torque.
    pub tau_est: f64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Lower position bound.
    pub min: f64,
    /// Upper position bound.
    pub max: f64,
}

impl JointReading {
    /// Position within the joint's range, normalized to `0.0..=1.0`.
    ///
    /// Returns `None` for a degenerate range (`min == max`) instead of
    /// dividing by zero.
    pub fn position_ratio(&self) -> Option<f64> {
        let span = self.max - self.min;
        if span == 0.0 {
            return None;
        }
        Some((self.q - self.min) / span)
    }
}

// ── RobotState ───────────────────────────────────────────────────────

/// A decoded robot-state snapshot, one full telemetry frame.
///
/// Immutable once decoded; the store replaces the whole value on each
/// frame. Joint order is meaningful (arm/hand grouping and display
/// order depend on it) and is preserved exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub joints: Vec<JointReading>,
    /// Producer-side monotonic counter. Not enforced locally; the
    /// store simply replaces the prior value.
    pub tick: u64,
    /// Battery percentage. Range policy belongs to consumers.
    pub battery: f64,
    /// CPU load percentage. Range policy belongs to consumers.
    pub cpu: f64,
}

impl RobotState {
    /// Look up a joint by name.
    pub fn joint(&self, name: &str) -> Option<&JointReading> {
        self.joints.iter().find(|j| j.name == name)
    }
}

// ── BatteryState ─────────────────────────────────────────────────────

/// Payload of the well-known battery-status channel
/// (`sensor_msgs/BatteryState` shape).
///
/// Uses `#[serde(flatten)]` to capture all fields beyond the core set,
/// so nothing from the producer is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryState {
    /// Battery voltage in volts.
    #[serde(default)]
    pub voltage: f64,

    /// Charge on a `0.0..=1.0` range.
    #[serde(default)]
    pub percentage: f64,

    /// Temperature in degrees Celsius.
    #[serde(default)]
    pub temperature: f64,

    /// All remaining fields the producer sends (current, capacity,
    /// cell voltages, ...), passed through opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Decoder ──────────────────────────────────────────────────────────

/// Decode one raw text frame into a [`RobotState`].
///
/// Pure and stateless. Failures carry the original payload for
/// diagnostics and must be tolerated by callers: a bad frame is
/// dropped, the connection stays up.
pub fn decode_state(text: &str) -> Result<RobotState, Error> {
    serde_json::from_str(text).map_err(|e| Error::Decode {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
