//! Per-session flow-control credits.

use std::sync::atomic::{AtomicU32, Ordering};

/// Frames the peer has said it can absorb.
///
/// Replenished by `fillToken`, spent per screen frame. A frame sent with
/// no credit left is dropped instead of queued. The balance is capped so
/// a peer cannot bank an unbounded number of frames.
#[derive(Debug)]
pub struct FlowCredit {
    available: AtomicU32,
    max: u32,
    enabled: bool,
}

impl FlowCredit {
    pub fn new(initial: u32, max: u32, enabled: bool) -> Self {
        Self {
            available: AtomicU32::new(initial.min(max)),
            max,
            enabled,
        }
    }

    pub fn add(&self, count: u32) {
        let max = self.max;
        let _ = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(count).min(max))
            });
    }

    /// Spend one credit; `false` means the frame must be dropped.
    pub fn try_take(&self) -> bool {
        if !self.enabled {
            return true;
        }
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }
}
