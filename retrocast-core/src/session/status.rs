//! Coarse connection status surfaced to callers.
//!
//! Informational only: protocol correctness never depends on it.

use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of one session or client connection.
///
/// ```text
///  Connecting ──► Connected ──► Disconnected ──► Connecting ...
///                                    │
///                                    ▼
///                                 Shutdown
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// A connection attempt is in flight.
    #[default]
    Connecting,

    /// The transport is up.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },

    /// The transport closed; a reconnect may follow.
    Disconnected,

    /// Terminal: the owner was canceled.
    Shutdown,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected { .. } => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl SessionStatus {
    pub fn connected_now() -> Self {
        Self::Connected {
            since: Instant::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// How long the connection has been up; `None` unless connected.
    pub fn connected_duration(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        assert_eq!(SessionStatus::Connecting.to_string(), "connecting");
        assert_eq!(SessionStatus::connected_now().to_string(), "connected");
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(SessionStatus::Shutdown.to_string(), "shutdown");
    }

    #[test]
    fn duration_only_while_connected() {
        assert!(SessionStatus::connected_now().connected_duration().is_some());
        assert!(SessionStatus::Disconnected.connected_duration().is_none());
        assert!(!SessionStatus::default().is_connected());
    }
}
