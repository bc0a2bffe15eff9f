//! Configuration for the streaming server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use retrocast_core::codec::VideoConfig;
use retrocast_core::session::StreamSettings;
use retrocast_core::source::{Geometry, PixelFormat};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Frame source settings.
    pub emulator: EmulatorConfig,
    /// Screen encoder tuning.
    pub encoder: EncoderConfig,
    /// Broadcast hub sizing.
    pub hub: HubConfig,
    /// Per-viewer session behavior.
    pub session: SessionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind: String,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Cartridge image; empty runs the built-in test pattern unseeded.
    pub cartridge: PathBuf,
    /// Frames per second the producer ticks at.
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Audio sample rate in Hz (stereo).
    pub sample_rate: u32,
}

/// Screen encoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Force a key frame at least every N frames.
    pub key_frame_interval: u32,
    /// Initial zstd level (1-9); adapted at runtime.
    pub compression_level: i32,
    /// Target screen bitrate in kilobits per second.
    pub target_kbps: u64,
}

/// Broadcast hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Ingress ring size of each hub.
    pub ingress_capacity: usize,
    /// Per-viewer screen queue; 1 means latest frame wins.
    pub screen_queue: usize,
    /// Per-viewer sound queue.
    pub sound_queue: usize,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Drop screen frames for viewers that ran out of credit.
    pub flow_control: bool,
    pub initial_credits: u32,
    pub max_credits: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            cartridge: PathBuf::new(),
            fps: 60,
            width: 240,
            height: 160,
            sample_rate: 32_768,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            key_frame_interval: 120,
            compression_level: 3,
            target_kbps: 2_000,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: 4,
            screen_queue: 1,
            sound_queue: 8,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flow_control: true,
            initial_credits: 4,
            max_credits: 8,
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

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
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

    /// Framebuffer shape, with the size clamped to something sane.
    pub fn geometry(&self) -> Geometry {
        Geometry::new(
            self.emulator.width.clamp(8, 1024),
            self.emulator.height.clamp(8, 1024),
            PixelFormat::Rgb565,
        )
    }

    pub fn fps(&self) -> u32 {
        self.emulator.fps.clamp(1, 120)
    }

    pub fn video_config(&self) -> VideoConfig {
        VideoConfig {
            geometry: self.geometry(),
            fps: self.fps(),
            bitrate: self.encoder.target_kbps.max(1) * 1000,
            key_frame_interval: self.encoder.key_frame_interval.max(1),
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            screen_queue: self.hub.screen_queue.max(1),
            sound_queue: self.hub.sound_queue.max(1),
            flow_control: self.session.flow_control,
            initial_credits: self.session.initial_credits,
            max_credits: self.session.max_credits.max(1),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
