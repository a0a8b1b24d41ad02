// ── Outbound command payloads ──

use serde_json::Value;

use crate::error::CoreError;

/// One neck pose command: pitch and yaw in radians.
///
/// Serialized as a flat float array (`{"data": [pitch, yaw]}`) to match
/// the controller's multi-array input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeckCommand {
    pub pitch: f64,
    pub yaw: f64,
}

impl NeckCommand {
    pub fn new(pitch: f64, yaw: f64) -> Self {
        Self { pitch, yaw }
    }

    /// Validate and build the wire payload.
    ///
    /// NaN and infinite values are rejected here rather than sent; the
    /// controller side silently misbehaves on non-finite input.
    pub fn to_payload(&self) -> Result<Value, CoreError> {
        if !self.pitch.is_finite() || !self.yaw.is_finite() {
            return Err(CoreError::Config {
                message: format!(
                    "neck command values must be finite (pitch={}, yaw={})",
                    self.pitch, self.yaw
                ),
            });
        }
        Ok(serde_json::json!({ "data": [self.pitch, self.yaw] }))
    }
}
