// ── Runtime session configuration ──
//
// These types describe *how* to reach a telemetry bridge. They carry
// the endpoint and tuning knobs but never touch disk -- the CLI builds
// a `SessionConfig` from its profile layer and hands it in.

use std::time::Duration;

use jointly_api::SocketConfig;
use url::Url;

/// Well-known command channel from the dashboard's control panel.
pub const DEFAULT_COMMAND_TOPIC: &str = "/neck_controller/command";

/// Schema identifier for the command channel payload.
pub const FLOAT64_MULTI_ARRAY: &str = "std_msgs/Float64MultiArray";

/// Well-known battery-status channel.
pub const DEFAULT_BATTERY_TOPIC: &str = "/battery_state";

/// Fallback schema identifier for the battery channel, used when the
/// directory has no entry for it.
pub const DEFAULT_BATTERY_TYPE: &str = "sensor_msgs/BatteryState";

/// Configuration for one bridge session.
///
/// Built by the CLI (or any other consumer), passed to `Session` --
/// core never reads config files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bridge endpoint (e.g., `ws://192.168.123.4:9090`). Scheme, host,
    /// port, and path are all caller-supplied -- nothing is hardcoded.
    pub url: Url,

    /// Socket-level tuning (timeouts, channel capacities).
    pub socket: SocketConfig,

    /// Topic advertised on connect for outbound commands.
    pub command_topic: String,

    /// Schema identifier for the command topic.
    pub command_type: String,

    /// Fixed well-known channel subscribed on connect, if any.
    /// `None` disables the battery listener entirely.
    pub battery_topic: Option<String>,
}

impl SessionConfig {
    /// Config for `url` with default tuning and well-known channels.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            socket: SocketConfig::default(),
            command_topic: DEFAULT_COMMAND_TOPIC.to_owned(),
            command_type: FLOAT64_MULTI_ARRAY.to_owned(),
            battery_topic: Some(DEFAULT_BATTERY_TOPIC.to_owned()),
        }
    }

    /// Override the connect/service deadlines (builder-style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.socket.connect_timeout = timeout;
        self.socket.service_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(
            "ws://127.0.0.1:9090"
                .parse()
                .expect("default bridge URL is valid"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_local_bridge() {
        let config = SessionConfig::default();
        assert_eq!(config.url.as_str(), "ws://127.0.0.1:9090/");
        assert_eq!(config.command_topic, DEFAULT_COMMAND_TOPIC);
        assert_eq!(config.battery_topic.as_deref(), Some(DEFAULT_BATTERY_TOPIC));
    }

    #[test]
    fn with_timeout_applies_to_both_deadlines() {
        let config = SessionConfig::default().with_timeout(Duration::from_secs(3));
        assert_eq!(config.socket.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.socket.service_timeout, Duration::from_secs(3));
    }
}
