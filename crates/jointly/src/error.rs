//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use jointly_config::ConfigError;
use jointly_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to bridge at {url}")]
    #[diagnostic(
        code(jointly::connection_failed),
        help(
            "Check that the bridge is running and accessible.\n\
             URL: {url}\n\
             Try: jointly status --bridge {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Not connected to a bridge")]
    #[diagnostic(
        code(jointly::not_connected),
        help("The connection dropped before the operation completed.")
    )]
    NotConnected,

    #[error("Bridge operation timed out after {seconds}s")]
    #[diagnostic(
        code(jointly::timeout),
        help("Increase timeout with --timeout or check bridge responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Telemetry ────────────────────────────────────────────────────

    #[error("No telemetry frame arrived within {seconds}s")]
    #[diagnostic(
        code(jointly::no_telemetry),
        help(
            "The bridge is connected but not sending robot state.\n\
             Check that the telemetry producer is running."
        )
    )]
    NoTelemetry { seconds: u64 },

    // ── Topics ───────────────────────────────────────────────────────

    #[error("Topic '{name}' not found on the bridge")]
    #[diagnostic(
        code(jointly::topic_not_found),
        help("Run: jointly topics to see available topics")
    )]
    TopicNotFound { name: String },

    #[error("Topic directory query failed: {message}")]
    #[diagnostic(code(jointly::directory))]
    Directory { message: String },

    // ── Publishing ───────────────────────────────────────────────────

    #[error("Topic '{topic}' has not been advertised on this connection")]
    #[diagnostic(
        code(jointly::not_advertised),
        help("The command topic is advertised automatically on connect; check the profile's command_topic setting.")
    )]
    NotAdvertised { topic: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(jointly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(jointly::profile_not_found),
        help(
            "Create one with: jointly config init --bridge ws://<host>:9090 --name {name}\n\
             Or pass the URL directly: --bridge ws://<host>:9090"
        )
    )]
    ProfileNotFound { name: String },

    #[error("No bridge configured")]
    #[diagnostic(
        code(jointly::no_config),
        help(
            "Pass --bridge ws://<host>:9090, or create a profile with: jointly config init\n\
             Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(jointly::config))]
    Config(String),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(jointly::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::Timeout { .. } | Self::NoTelemetry { .. } => exit_code::TIMEOUT,
            Self::TopicNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::NotConnected | CoreError::SessionClosed => CliError::NotConnected,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotAdvertised { topic } => CliError::NotAdvertised { topic },

            CoreError::Directory { message } => CliError::Directory { message },

            CoreError::TopicNotFound { name } => CliError::TopicNotFound { name },

            CoreError::Decode { message } => CliError::Validation {
                field: "frame".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config(message),

            CoreError::Internal(message) => CliError::Config(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound { name: profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
