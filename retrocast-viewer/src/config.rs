//! Viewer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use retrocast_core::client::ClientOptions;
use retrocast_core::source::{Geometry, PixelFormat};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Reconnect policy.
    pub reconnect: ReconnectConfig,
    /// Remote screen shape.
    pub display: DisplayConfig,
    /// Stats refresh.
    pub stats: StatsConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// WebSocket endpoint of the server.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

/// The stream carries no geometry, so the viewer must be told.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// How often fps and staleness are recomputed.
    pub refresh_ms: u64,
    /// Pongs averaged into the round-trip estimate.
    pub rtt_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/stream".into(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 240,
            height: 160,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 1_000,
            rtt_window: 16,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.display.width, self.display.height, PixelFormat::Rgb565)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            initial_backoff: Duration::from_millis(self.reconnect.initial_backoff_ms.max(1)),
            max_backoff: Duration::from_millis(self.reconnect.max_backoff_ms.max(1)),
            refresh_interval: Duration::from_millis(self.stats.refresh_ms.max(10)),
            rtt_window: self.stats.rtt_window.max(1),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let cfg = ViewerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("initial_backoff_ms"));
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.url, "ws://127.0.0.1:8080/stream");
        assert_eq!(parsed.display.width, 240);
    }

    #[test]
    fn client_options_follow_config() {
        let mut cfg = ViewerConfig::default();
        cfg.reconnect.initial_backoff_ms = 250;
        cfg.stats.rtt_window = 0;
        let opts = cfg.client_options();
        assert_eq!(opts.initial_backoff, Duration::from_millis(250));
        assert_eq!(opts.max_backoff, Duration::from_secs(60));
        assert_eq!(opts.rtt_window, 1);
    }
}
