// ── Core error types ──
//
// User-facing errors from ankerdash-core. Consumers never see raw
// WebSocket failures here: the `From<ankerdash_api::Error>` impl
// translates transport-layer errors into dashboard-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("Channel '{name}' is already registered")]
    DuplicateChannel { name: String },

    #[error("Unknown channel '{name}'")]
    UnknownChannel { name: String },

    #[error("Channel '{name}' is not open")]
    ChannelNotOpen { name: String },

    // ── Action errors ────────────────────────────────────────────────
    #[error("A {active} action is already in progress")]
    ActionAlreadyInProgress { active: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to bridge at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Bridge did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ankerdash_api::Error> for CoreError {
    fn from(err: ankerdash_api::Error) -> Self {
        match err {
            ankerdash_api::Error::ChannelNotOpen { channel } => {
                CoreError::ChannelNotOpen { name: channel }
            }
            ankerdash_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid bridge URL: {e}"),
            },
            ankerdash_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("unsupported bridge scheme '{scheme}'"),
            },
            ankerdash_api::Error::WebSocketConnect(reason)
            | ankerdash_api::Error::WebSocketTransport(reason) => CoreError::ConnectionFailed {
                url: "<bridge>".into(),
                reason,
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("JSON encoding failed: {err}"))
    }
}
