//! Process-wide streaming context.
//!
//! Everything a session or the status endpoint needs is reached through
//! one `Arc<StreamHost>` built in `main`; there are no globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use retrocast_core::session::{SessionId, StreamChannels};

/// Encoder-side measurements, refreshed about once per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProducerStats {
    /// Encoded frames per second.
    pub fps: f64,
    /// Screen bitrate in bits per second.
    pub bitrate: f64,
}

/// JSON body of `GET /status`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub fps: f64,
    pub bitrate: f64,
    /// Seconds since the server started.
    pub uptime: u64,
    pub active_connections: usize,
    pub codec: String,
}

pub struct StreamHost {
    channels: Arc<StreamChannels>,
    started: Instant,
    next_session: AtomicU64,
    stats_tx: watch::Sender<ProducerStats>,
    shutdown: CancellationToken,
}

impl StreamHost {
    pub fn new(channels: Arc<StreamChannels>, shutdown: CancellationToken) -> Self {
        let (stats_tx, _) = watch::channel(ProducerStats::default());
        Self {
            channels,
            started: Instant::now(),
            next_session: AtomicU64::new(1),
            stats_tx,
            shutdown,
        }
    }

    pub fn channels(&self) -> &Arc<StreamChannels> {
        &self.channels
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn next_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }

    pub fn publish_stats(&self, stats: ProducerStats) {
        self.stats_tx.send_replace(stats);
    }

    pub fn stats(&self) -> ProducerStats {
        *self.stats_tx.borrow()
    }

    /// Viewers currently subscribed to the screen hub.
    pub fn active_connections(&self) -> usize {
        self.channels.screen.subscriber_count()
    }

    pub fn status(&self) -> StatusReport {
        let stats = self.stats();
        StatusReport {
            fps: stats.fps,
            bitrate: stats.bitrate,
            uptime: self.uptime().as_secs(),
            active_connections: self.active_connections(),
            codec: self.channels.codec().to_string(),
        }
    }
}
