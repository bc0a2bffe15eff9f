//! Viewer-side health indicators.

use std::time::Duration;

use tokio::time::Instant;

use crate::session::SessionStatus;

/// Snapshot published once per refresh interval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStats {
    pub status: SessionStatus,
    /// Screen frames received during the last interval, per second.
    pub fps: f64,
    /// Longest gap between two screen frames in the last interval;
    /// `None` when no frame arrived during it.
    pub worst_frame_gap: Option<Duration>,
    /// Mean round-trip time over the recent pongs.
    pub rtt_ms: Option<f64>,
    /// Codec announced by the server.
    pub codec: Option<String>,
}

/// Per-interval frame counter and gap tracker.
#[derive(Debug)]
pub struct FrameClock {
    interval_start: Instant,
    frames: u32,
    last_frame: Option<Instant>,
    worst_gap: Option<Duration>,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            interval_start: now,
            frames: 0,
            last_frame: None,
            worst_gap: None,
        }
    }

    pub fn record_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            let gap = now.saturating_duration_since(last);
            self.worst_gap = Some(self.worst_gap.map_or(gap, |w| w.max(gap)));
        }
        self.last_frame = Some(now);
        self.frames += 1;
    }

    /// Close the current interval: returns `(fps, worst_gap)` and starts a
    /// new one.
    pub fn roll(&mut self, now: Instant) -> (f64, Option<Duration>) {
        let elapsed = now.saturating_duration_since(self.interval_start);
        let fps = if elapsed.is_zero() {
            0.0
        } else {
            f64::from(self.frames) / elapsed.as_secs_f64()
        };
        let fresh = self
            .last_frame
            .is_some_and(|last| last >= self.interval_start);
        let worst = if fresh { self.worst_gap } else { None };

        self.interval_start = now;
        self.frames = 0;
        self.worst_gap = None;
        (fps, worst)
    }
}
