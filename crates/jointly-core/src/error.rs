// ── Core error types ──
//
// User-facing errors from jointly-core. These are NOT wire-specific --
// consumers never see tungstenite errors or JSON parse failures
// directly. The `From<jointly_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to bridge at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session closed")]
    SessionClosed,

    #[error("Bridge operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Publish preconditions ────────────────────────────────────────
    #[error("Topic '{topic}' has not been advertised")]
    NotAdvertised { topic: String },

    // ── Directory / subscription errors ──────────────────────────────
    #[error("Topic directory query failed: {message}")]
    Directory { message: String },

    #[error("Topic '{name}' not found in directory")]
    TopicNotFound { name: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Frame decode failed: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<jointly_api::Error> for CoreError {
    fn from(err: jointly_api::Error) -> Self {
        match err {
            jointly_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            jointly_api::Error::SocketClosed => CoreError::NotConnected,
            jointly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            jointly_api::Error::ConnectTimeout { timeout_secs }
            | jointly_api::Error::ServiceTimeout { timeout_secs, .. } => {
                CoreError::Timeout { timeout_secs }
            }
            jointly_api::Error::Decode { message, body: _ } => CoreError::Decode { message },
            jointly_api::Error::ServiceCall { service, message } => CoreError::Directory {
                message: format!("{service}: {message}"),
            },
            jointly_api::Error::Send(message) => CoreError::Internal(message),
        }
    }
}
