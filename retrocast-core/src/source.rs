//! Frame-producing engine interface and framebuffer geometry.
//!
//! The emulation core itself lives outside this crate; anything that can
//! step one frame at a time and expose its framebuffer implements
//! [`FrameSource`].

use crate::protocol::key::KeyState;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 2 bytes per pixel, 5-6-5 little-endian (handheld LCD native).
    Rgb565,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgba8 => 4,
        }
    }
}

// ── Geometry ─────────────────────────────────────────────────────

/// Fixed shape of every framebuffer a source produces.
///
/// Rows are tightly packed: no stride padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Geometry {
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Total byte size of one framebuffer.
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// A frame producer driven one frame per tick.
pub trait FrameSource: Send {
    /// Shape of [`current_framebuffer`](Self::current_framebuffer).
    fn geometry(&self) -> Geometry;

    /// Run the engine for one video frame; returns cycles consumed.
    fn advance_one_frame(&mut self) -> u64;

    /// Read-only view of the most recently completed frame.
    fn current_framebuffer(&self) -> &[u8];

    /// Move interleaved stereo samples produced since the last call into
    /// `out`. Sources without audio leave `out` untouched.
    fn drain_audio(&mut self, _out: &mut Vec<i16>) {}

    /// Latch the keypad state used by the next frame.
    fn set_keys(&mut self, keys: KeyState);
}
