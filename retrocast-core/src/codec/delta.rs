//! zstd key frames plus XOR deltas against the most recent key frame.
//!
//! Deltas reference the key frame rather than the previous frame, so a
//! viewer that drops any number of delta payloads (latest-frame-wins
//! queues do that routinely) still decodes the next one correctly.
//! Losing a key frame stalls decoding until the next one.
//!
//! ## Wire format
//!
//! ```text
//! kind:    u8   (0 = key frame, 1 = delta)
//! key_id:  u32  (LE, id of the key frame the payload belongs to)
//! body:    [u8] (zstd; key = raw framebuffer, delta = framebuffer XOR key)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{EncodedFrame, VideoConfig, VideoDecoder, VideoEncoder};
use crate::error::StreamError;
use crate::pipeline::FrameBuffer;

/// Codec identifier announced in `init`.
pub const CODEC_ID: &str = "zstd-xor";

const HEADER_LEN: usize = 5;
const KIND_KEY: u8 = 0;
const KIND_DELTA: u8 = 1;

const MIN_LEVEL: i32 = 1;
const MAX_LEVEL: i32 = 9;

// ── DeltaEncoder ─────────────────────────────────────────────────

/// Stateful encoder; remembers the last key frame.
pub struct DeltaEncoder {
    config: Option<VideoConfig>,
    compression_level: i32,
    key_frame: Vec<u8>,
    key_id: u32,
    scratch: Vec<u8>,
    frames_since_key: u32,
    force_key: bool,
}

impl DeltaEncoder {
    pub fn new(compression_level: i32) -> Self {
        Self {
            config: None,
            compression_level: compression_level.clamp(MIN_LEVEL, MAX_LEVEL),
            key_frame: Vec::new(),
            key_id: 0,
            scratch: Vec::new(),
            frames_since_key: 0,
            force_key: true,
        }
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    fn wants_key_frame(&self, config: &VideoConfig) -> bool {
        self.force_key
            || self.key_frame.is_empty()
            || self.frames_since_key >= config.key_frame_interval.max(1)
    }

    fn frame_payload(&self, kind: u8, body: &[u8]) -> Result<Bytes, StreamError> {
        let compressed = zstd::bulk::compress(body, self.compression_level)
            .map_err(|e| StreamError::Codec(format!("zstd encode failed: {e}")))?;
        let mut out = BytesMut::with_capacity(HEADER_LEN + compressed.len());
        out.put_u8(kind);
        out.put_u32_le(self.key_id);
        out.extend_from_slice(&compressed);
        Ok(out.freeze())
    }
}

impl VideoEncoder for DeltaEncoder {
    fn codec_id(&self) -> &str {
        CODEC_ID
    }

    fn configure(&mut self, config: VideoConfig) -> Result<(), StreamError> {
        if config.geometry.byte_len() == 0 {
            return Err(StreamError::Codec("empty frame geometry".into()));
        }
        self.config = Some(config);
        self.key_frame.clear();
        self.force_key = true;
        Ok(())
    }

    fn encode_frame(&mut self, frame: &FrameBuffer) -> Result<Vec<EncodedFrame>, StreamError> {
        let config = self
            .config
            .ok_or_else(|| StreamError::Codec("encoder not configured".into()))?;
        let data = frame.data();

        if self.wants_key_frame(&config) {
            self.key_id = self.key_id.wrapping_add(1);
            self.key_frame.clear();
            self.key_frame.extend_from_slice(data);
            self.frames_since_key = 0;
            self.force_key = false;
            let payload = self.frame_payload(KIND_KEY, data)?;
            return Ok(vec![EncodedFrame {
                data: payload,
                is_key_frame: true,
            }]);
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend(data.iter().zip(&self.key_frame).map(|(a, b)| a ^ b));
        let payload = self.frame_payload(KIND_DELTA, &scratch);
        self.scratch = scratch;
        self.frames_since_key += 1;

        Ok(vec![EncodedFrame {
            data: payload?,
            is_key_frame: false,
        }])
    }

    fn request_key_frame(&mut self) {
        self.force_key = true;
    }

    /// Trade CPU for size when over budget, and the reverse when well under.
    fn adjust_quality(&mut self, measured_bitrate: u64) {
        let Some(config) = self.config else { return };
        if measured_bitrate > config.bitrate {
            self.compression_level = (self.compression_level + 1).min(MAX_LEVEL);
        } else if measured_bitrate < config.bitrate * 8 / 10 {
            self.compression_level = (self.compression_level - 1).max(MIN_LEVEL);
        }
    }
}

// ── DeltaDecoder ─────────────────────────────────────────────────

/// Viewer-side counterpart of [`DeltaEncoder`].
pub struct DeltaDecoder {
    frame_len: usize,
    key_frame: Vec<u8>,
    key_id: Option<u32>,
    frame: Vec<u8>,
}

impl DeltaDecoder {
    /// `frame_len` is the byte size of one decoded framebuffer.
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            key_frame: Vec::new(),
            key_id: None,
            frame: vec![0; frame_len],
        }
    }

    /// Last successfully decoded framebuffer.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}

impl VideoDecoder for DeltaDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<&[u8], StreamError> {
        if payload.len() < HEADER_LEN {
            return Err(StreamError::Codec(format!(
                "payload too short: {} < {HEADER_LEN}",
                payload.len()
            )));
        }
        let kind = payload[0];
        let key_id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let body = zstd::bulk::decompress(&payload[HEADER_LEN..], self.frame_len)
            .map_err(|e| StreamError::Codec(format!("zstd decode failed: {e}")))?;
        if body.len() != self.frame_len {
            return Err(StreamError::Codec(format!(
                "frame size mismatch: expected {}, got {}",
                self.frame_len,
                body.len()
            )));
        }

        match kind {
            KIND_KEY => {
                self.frame.copy_from_slice(&body);
                self.key_frame = body;
                self.key_id = Some(key_id);
            }
            KIND_DELTA => {
                if self.key_id != Some(key_id) {
                    return Err(StreamError::Codec(format!(
                        "delta references key frame {key_id}, which was not received"
                    )));
                }
                for ((out, d), k) in self.frame.iter_mut().zip(&body).zip(&self.key_frame) {
                    *out = d ^ k;
                }
            }
            other => {
                return Err(StreamError::Codec(format!("unknown frame kind {other}")));
            }
        }

        Ok(&self.frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────
