//! Encoder/decoder interfaces and the reference codecs.
//!
//! Production deployments plug a hardware or library video codec in
//! behind [`VideoEncoder`]; the crate ships [`DeltaEncoder`] so the whole
//! pipeline runs without native dependencies.
//!
//! | Module  | Purpose                                              |
//! |---------|------------------------------------------------------|
//! | `delta` | zstd key frames + XOR deltas against the last key    |
//! | `pcm`   | 16-bit little-endian PCM for the sound stream        |

pub mod delta;
pub mod pcm;

use bytes::Bytes;

use crate::error::StreamError;
use crate::pipeline::FrameBuffer;
use crate::source::Geometry;

pub use delta::{DeltaDecoder, DeltaEncoder};
pub use pcm::PcmEncoder;

// ── EncodedFrame ─────────────────────────────────────────────────

/// A compressed payload ready for the wire.
///
/// `data` is reference-counted, so fanning one frame out to many
/// viewers never copies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Bytes,
    pub is_key_frame: bool,
}

impl EncodedFrame {
    /// Payload size in bits.
    pub fn bits(&self) -> u64 {
        self.data.len() as u64 * 8
    }
}

// ── VideoConfig ──────────────────────────────────────────────────

/// Parameters handed to [`VideoEncoder::configure`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConfig {
    pub geometry: Geometry,
    /// Frames per second the producer ticks at.
    pub fps: u32,
    /// Target bitrate in bits/second.
    pub bitrate: u64,
    /// Force a key frame at least this often (in frames).
    pub key_frame_interval: u32,
}

// ── Traits ───────────────────────────────────────────────────────

/// Compresses raw framebuffers into wire payloads.
///
/// Implementations release native resources in `Drop`.
pub trait VideoEncoder: Send {
    /// Identifier announced to viewers in the `init` message.
    fn codec_id(&self) -> &str;

    fn configure(&mut self, config: VideoConfig) -> Result<(), StreamError>;

    /// Encode one frame into zero or more payloads.
    fn encode_frame(&mut self, frame: &FrameBuffer) -> Result<Vec<EncodedFrame>, StreamError>;

    /// Make the next encoded frame a key frame (e.g. a viewer joined).
    fn request_key_frame(&mut self);

    /// Feedback from the producer loop about the bitrate actually used.
    fn adjust_quality(&mut self, _measured_bitrate: u64) {}
}

/// Reconstructs framebuffers from wire payloads on the viewer side.
pub trait VideoDecoder: Send {
    /// Decode one payload; the returned slice is the full framebuffer.
    fn decode(&mut self, payload: &[u8]) -> Result<&[u8], StreamError>;
}
