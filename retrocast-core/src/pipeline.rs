//! Two-slot frame handoff between the producer and the encoder.
//!
//! ```text
//!            ┌──── free slots ◄────┐
//!            ▼                      │
//!  PipelineProducer            PipelineConsumer
//!  (copies framebuffer)        (runs the encoder)
//!            │                      ▲
//!            └──── filled slots ───►┘
//! ```
//!
//! Exactly two [`FrameBuffer`]s are allocated up front and move by value
//! through two bounded channels, so a slot is owned by at most one side
//! at any instant and nothing is allocated per frame. With two slots
//! the producer fills frame N+1 while the encoder still works on frame
//! N, at the cost of one frame of latency.
//!
//! The pipeline does not know about viewers: skipping
//! [`enqueue_frame`](PipelineProducer::enqueue_frame) when nobody is
//! watching is the caller's job.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::source::{FrameSource, Geometry};

/// Number of buffers circulating through the pipeline.
pub const SLOT_COUNT: usize = 2;

// ── FrameBuffer ──────────────────────────────────────────────────

/// One reusable framebuffer slot.
#[derive(Debug)]
pub struct FrameBuffer {
    geometry: Geometry,
    data: Box<[u8]>,
    sequence: u64,
    captured_at: Instant,
}

impl FrameBuffer {
    fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            data: vec![0u8; geometry.byte_len()].into_boxed_slice(),
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Producer-assigned frame number (0-based).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the producer copied this frame in.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

// ── FramePipeline ────────────────────────────────────────────────

/// Constructor for the producer/consumer halves.
pub struct FramePipeline;

impl FramePipeline {
    /// Allocate both slots for frames of `geometry` and split into halves.
    pub fn new(geometry: Geometry) -> (PipelineProducer, PipelineConsumer) {
        let (free_tx, free_rx) = mpsc::channel(SLOT_COUNT);
        let (filled_tx, filled_rx) = mpsc::channel(SLOT_COUNT);

        for _ in 0..SLOT_COUNT {
            // Capacity equals SLOT_COUNT, so this never fails.
            let _ = free_tx.try_send(FrameBuffer::new(geometry));
        }

        (
            PipelineProducer {
                geometry,
                free_rx,
                filled_tx,
                next_sequence: 0,
            },
            PipelineConsumer { filled_rx, free_tx },
        )
    }
}

// ── PipelineProducer ─────────────────────────────────────────────

/// Producer half: owns the receiving end of the free-slot channel.
pub struct PipelineProducer {
    geometry: Geometry,
    free_rx: mpsc::Receiver<FrameBuffer>,
    filled_tx: mpsc::Sender<FrameBuffer>,
    next_sequence: u64,
}

impl PipelineProducer {
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Copy the source's current frame into a free slot and hand it to
    /// the encoder.
    ///
    /// Waits for a free slot; fails with [`StreamError::Canceled`] if
    /// `cancel` fires first, or [`StreamError::ChannelClosed`] if the
    /// consumer half was dropped.
    pub async fn enqueue_frame<S>(
        &mut self,
        source: &S,
        cancel: &CancellationToken,
    ) -> Result<u64, StreamError>
    where
        S: FrameSource + ?Sized,
    {
        let mut slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Canceled),
            slot = self.free_rx.recv() => slot.ok_or(StreamError::ChannelClosed)?,
        };

        let frame = source.current_framebuffer();
        debug_assert_eq!(
            frame.len(),
            slot.data.len(),
            "frame source geometry does not match pipeline geometry"
        );
        let len = frame.len().min(slot.data.len());
        slot.data[..len].copy_from_slice(&frame[..len]);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        slot.sequence = sequence;
        slot.captured_at = Instant::now();

        self.filled_tx
            .send(slot)
            .await
            .map_err(|_| StreamError::ChannelClosed)?;
        Ok(sequence)
    }
}

// ── PipelineConsumer ─────────────────────────────────────────────

/// Consumer half: owns the receiving end of the filled-slot channel.
pub struct PipelineConsumer {
    filled_rx: mpsc::Receiver<FrameBuffer>,
    free_tx: mpsc::Sender<FrameBuffer>,
}

impl PipelineConsumer {
    /// Wait for a filled slot, run `process` on it, then recycle it.
    pub async fn dequeue_frame<F, R>(
        &mut self,
        process: F,
        cancel: &CancellationToken,
    ) -> Result<R, StreamError>
    where
        F: FnOnce(&FrameBuffer) -> R,
    {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Canceled),
            slot = self.filled_rx.recv() => slot.ok_or(StreamError::ChannelClosed)?,
        };

        let result = process(&slot);

        // The free channel has room for every slot in existence; a send
        // error only means the producer is gone.
        let _ = self.free_tx.try_send(slot);
        Ok(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────
