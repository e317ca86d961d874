use thiserror::Error;

/// Top-level error type for the `ankerdash-api` crate.
///
/// Covers every failure mode of a channel: URL derivation, the WebSocket
/// handshake, the live transport, and outbound sends. `ankerdash-core`
/// maps these into dashboard-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoints ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The bridge URL uses a scheme that has no WebSocket counterpart.
    #[error("Unsupported bridge scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The live connection failed while reading or writing frames.
    #[error("WebSocket transport error: {0}")]
    WebSocketTransport(String),

    // ── Channel usage ───────────────────────────────────────────────
    /// A send was attempted while the channel was not open.
    #[error("Channel '{channel}' is not open")]
    ChannelNotOpen { channel: String },
}

impl Error {
    /// Returns `true` if the error came from the network layer and is
    /// recovered by the reconnect loop.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::WebSocketConnect(_) | Self::WebSocketTransport(_))
    }
}
