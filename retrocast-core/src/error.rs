//! Domain-specific error types for retrocast.
//!
//! All fallible operations return `Result<T, StreamError>`.
//! Overflow is handled by drop policies, not by errors, so most of the
//! hot path never produces one of these.

use thiserror::Error;

/// The canonical error type for retrocast.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Buffer Errors ────────────────────────────────────────────
    /// A fixed-capacity structure was constructed with capacity zero.
    #[error("invalid capacity: must be greater than zero")]
    InvalidCapacity,

    /// Strict push into a ring buffer that is already full.
    #[error("ring buffer full (capacity {capacity})")]
    BufferFull { capacity: usize },

    /// Pop from an empty ring buffer.
    #[error("ring buffer empty")]
    BufferEmpty,

    // ── Pipeline Errors ──────────────────────────────────────────
    /// The operation was interrupted by its cancellation token.
    #[error("operation canceled")]
    Canceled,

    /// A channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Protocol Errors ──────────────────────────────────────────
    /// A control message did not match any known shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Transport Errors ─────────────────────────────────────────
    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    // ── Codec Errors ─────────────────────────────────────────────
    /// Encoding or decoding of a frame payload failed.
    #[error("codec error: {0}")]
    Codec(String),

    // ── Startup Errors ───────────────────────────────────────────
    /// A resource required before serving is missing or unreadable.
    #[error("startup failed: {0}")]
    Startup(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Other(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        StreamError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StreamError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StreamError::ChannelClosed
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::WebSocket(e.to_string())
    }
}
