use thiserror::Error;

/// Top-level error type for the `jointly-api` crate.
///
/// Covers every failure mode on the bridge transport: connection setup,
/// socket lifecycle, frame decoding, and service calls. `jointly-core`
/// maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// WebSocket connection or handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The socket is closed (torn down locally or dropped by the peer).
    #[error("Socket closed")]
    SocketClosed,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connection attempt exceeded the configured deadline.
    #[error("Connect timed out after {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// Frame decoding failed, with the raw payload for diagnostics.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    // ── Service calls ───────────────────────────────────────────────
    /// A bridge service call was rejected by the remote end.
    #[error("Service call '{service}' failed: {message}")]
    ServiceCall { service: String, message: String },

    /// A bridge service call received no response before the deadline.
    #[error("Service call '{service}' timed out after {timeout_secs}s")]
    ServiceTimeout { service: String, timeout_secs: u64 },

    // ── Outbound ────────────────────────────────────────────────────
    /// An outbound operation could not be queued for sending.
    #[error("Send failed: {0}")]
    Send(String),
}

impl Error {
    /// Returns `true` if this is a transient, connection-level error
    /// where reopening the socket might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::ConnectTimeout { .. } | Self::ServiceTimeout { .. }
        )
    }

    /// Returns `true` if the error indicates a malformed payload rather
    /// than a transport problem.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
