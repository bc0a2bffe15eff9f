//! Incremental moving average over a fixed number of samples.
//!
//! Each sample is stored pre-divided by the window size, so the running
//! total *is* the average once the window has filled. Updates are O(1):
//! the evicted contribution is subtracted and the new one added. The
//! result drifts from an exact recomputation only by floating-point
//! summation error.

use crate::error::StreamError;
use crate::metrics::ring_buffer::RingBuffer;

/// Moving average of the last `window_size` samples.
#[derive(Debug, Clone)]
pub struct WindowAverage {
    contributions: RingBuffer<f64>,
    window_size: usize,
    total: f64,
}

impl WindowAverage {
    pub fn new(window_size: usize) -> Result<Self, StreamError> {
        Ok(Self {
            contributions: RingBuffer::new(window_size)?,
            window_size,
            total: 0.0,
        })
    }

    /// Record a new sample, evicting the oldest one when the window is full.
    pub fn add_sample(&mut self, value: f64) {
        let contribution = value / self.window_size as f64;
        if let Some(evicted) = self.contributions.push_and_pop_when_full(contribution) {
            self.total -= evicted;
        }
        self.total += contribution;
    }

    /// Mean of the samples currently in the window (0.0 when empty).
    ///
    /// While warming up, the total is rescaled to the number of samples
    /// actually seen.
    pub fn average(&self) -> f64 {
        let count = self.contributions.len();
        if count == 0 {
            0.0
        } else if count == self.window_size {
            self.total
        } else {
            self.total * self.window_size as f64 / count as f64
        }
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.contributions.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn reset(&mut self) {
        self.contributions.clear();
        self.total = 0.0;
    }
}

// ── Tests ────────────────────────────────────────────────────────
