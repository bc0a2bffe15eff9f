//! Built-in frame source.
//!
//! `TestPattern` stands in for a real emulation core: it scrolls a
//! gradient, moves a sprite with the keypad and emits a square-wave
//! tone, which is enough to exercise every part of the streaming path.
//! A cartridge image, when configured, is fingerprinted with BLAKE3 and
//! the digest seeds the palette so different images look different.

use std::path::{Path, PathBuf};

use retrocast_core::error::StreamError;
use retrocast_core::protocol::KeyState;
use retrocast_core::source::{FrameSource, Geometry, PixelFormat};

/// CPU cycles in one handheld video frame (228 lines × 1232 cycles).
pub const CYCLES_PER_FRAME: u64 = 280_896;

const SPRITE_SIZE: u32 = 16;
const SPRITE_SPEED: u32 = 2;
const TONE_HZ: u32 = 440;
const AMPLITUDE: i16 = 2_000;

// ── Cartridge ────────────────────────────────────────────────────

/// A cartridge image read once at startup.
#[derive(Debug, Clone)]
pub struct Cartridge {
    path: PathBuf,
    size: usize,
    fingerprint: blake3::Hash,
}

impl Cartridge {
    /// Read and fingerprint the image. Missing or empty files are fatal.
    pub fn load(path: &Path) -> Result<Self, StreamError> {
        let bytes = std::fs::read(path)
            .map_err(|e| StreamError::Startup(format!("cartridge {}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(StreamError::Startup(format!(
                "cartridge {} is empty",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size: bytes.len(),
            fingerprint: blake3::hash(&bytes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fingerprint(&self) -> String {
        self.fingerprint.to_hex().to_string()
    }

    fn palette_seed(&self) -> u16 {
        let b = self.fingerprint.as_bytes();
        u16::from_le_bytes([b[0], b[1]])
    }
}

// ── TestPattern ──────────────────────────────────────────────────

/// Synthetic RGB565 frame source.
pub struct TestPattern {
    geometry: Geometry,
    framebuffer: Vec<u8>,
    frame: u64,
    keys: KeyState,
    sprite_x: u32,
    sprite_y: u32,
    seed: u16,
    sample_rate: u32,
    fps: u32,
    sample_debt: u32,
    phase: u32,
    audio: Vec<i16>,
}

impl TestPattern {
    pub fn new(
        width: u32,
        height: u32,
        fps: u32,
        sample_rate: u32,
        cartridge: Option<&Cartridge>,
    ) -> Self {
        let geometry = Geometry::new(
            width.max(SPRITE_SIZE),
            height.max(SPRITE_SIZE),
            PixelFormat::Rgb565,
        );
        let mut pattern = Self {
            geometry,
            framebuffer: vec![0; geometry.byte_len()],
            frame: 0,
            keys: KeyState::empty(),
            sprite_x: (geometry.width - SPRITE_SIZE) / 2,
            sprite_y: (geometry.height - SPRITE_SIZE) / 2,
            seed: cartridge.map_or(0, Cartridge::palette_seed),
            sample_rate,
            fps: fps.max(1),
            sample_debt: 0,
            phase: 0,
            audio: Vec::new(),
        };
        pattern.render();
        pattern
    }

    /// Top-left corner of the sprite.
    pub fn sprite_position(&self) -> (u32, u32) {
        (self.sprite_x, self.sprite_y)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    fn move_sprite(&mut self) {
        let max_x = self.geometry.width - SPRITE_SIZE;
        let max_y = self.geometry.height - SPRITE_SIZE;
        if self.keys.contains(KeyState::LEFT) {
            self.sprite_x = self.sprite_x.saturating_sub(SPRITE_SPEED);
        }
        if self.keys.contains(KeyState::RIGHT) {
            self.sprite_x = (self.sprite_x + SPRITE_SPEED).min(max_x);
        }
        if self.keys.contains(KeyState::UP) {
            self.sprite_y = self.sprite_y.saturating_sub(SPRITE_SPEED);
        }
        if self.keys.contains(KeyState::DOWN) {
            self.sprite_y = (self.sprite_y + SPRITE_SPEED).min(max_y);
        }
    }

    fn render(&mut self) {
        let width = self.geometry.width;
        let scroll = self.frame as u32;
        let sprite = if self.keys.contains(KeyState::A) {
            0xF800
        } else {
            0xFFFF
        };

        for (i, px) in self.framebuffer.chunks_exact_mut(2).enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            let in_sprite = (self.sprite_x..self.sprite_x + SPRITE_SIZE).contains(&x)
                && (self.sprite_y..self.sprite_y + SPRITE_SIZE).contains(&y);
            let color = if in_sprite {
                sprite
            } else {
                let r = ((x + scroll) >> 3) & 0x1F;
                let g = (y >> 2) & 0x3F;
                let b = ((x + y) >> 4) & 0x1F;
                ((r << 11) | (g << 5) | b) as u16 ^ self.seed
            };
            px.copy_from_slice(&color.to_le_bytes());
        }
    }

    fn synthesize_audio(&mut self) {
        if self.sample_rate == 0 {
            return;
        }
        self.sample_debt += self.sample_rate;
        let count = self.sample_debt / self.fps;
        self.sample_debt %= self.fps;

        let pitch = if self.keys.contains(KeyState::B) {
            TONE_HZ * 2
        } else {
            TONE_HZ
        };
        let period = (self.sample_rate / pitch).max(2);
        for _ in 0..count {
            let v = if self.phase < period / 2 {
                AMPLITUDE
            } else {
                -AMPLITUDE
            };
            self.audio.extend_from_slice(&[v, v]);
            self.phase = (self.phase + 1) % period;
        }
    }
}

impl FrameSource for TestPattern {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn advance_one_frame(&mut self) -> u64 {
        self.move_sprite();
        self.frame += 1;
        self.render();
        self.synthesize_audio();
        CYCLES_PER_FRAME
    }

    fn current_framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    fn drain_audio(&mut self, out: &mut Vec<i16>) {
        out.append(&mut self.audio);
    }

    fn set_keys(&mut self, keys: KeyState) {
        self.keys = keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> TestPattern {
        TestPattern::new(240, 160, 60, 32_768, None)
    }

    #[test]
    fn framebuffer_matches_geometry() {
        let p = pattern();
        assert_eq!(p.current_framebuffer().len(), 240 * 160 * 2);
        assert_eq!(p.geometry().format, PixelFormat::Rgb565);
    }

    #[test]
    fn frames_change_over_time() {
        let mut p = pattern();
        let before = p.current_framebuffer().to_vec();
        for _ in 0..8 {
            assert_eq!(p.advance_one_frame(), CYCLES_PER_FRAME);
        }
        assert_ne!(p.current_framebuffer(), &before[..]);
        assert_eq!(p.frame_count(), 8);
    }

    #[test]
    fn sprite_follows_keys_and_stays_on_screen() {
        let mut p = pattern();
        let (x0, y0) = p.sprite_position();
        p.set_keys(KeyState::RIGHT | KeyState::UP);
        p.advance_one_frame();
        assert_eq!(p.sprite_position(), (x0 + 2, y0 - 2));

        p.set_keys(KeyState::LEFT);
        for _ in 0..500 {
            p.advance_one_frame();
        }
        assert_eq!(p.sprite_position().0, 0);
    }

    #[test]
    fn audio_rate_matches_sample_rate() {
        let mut p = pattern();
        let mut out = Vec::new();
        for _ in 0..60 {
            p.advance_one_frame();
        }
        p.drain_audio(&mut out);
        // One second of stereo audio.
        assert_eq!(out.len(), 32_768 * 2);
        assert!(out.iter().all(|s| s.abs() == AMPLITUDE));

        out.clear();
        p.drain_audio(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_cartridge_is_a_startup_error() {
        let err = Cartridge::load(Path::new("/nonexistent/game.gba")).unwrap_err();
        assert!(matches!(err, StreamError::Startup(_)));
    }

    #[test]
    fn cartridge_seeds_the_palette() {
        let dir = std::env::temp_dir().join(format!("retrocast-cart-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("game.gba");
        std::fs::write(&path, b"not really a rom").unwrap();

        let cart = Cartridge::load(&path).unwrap();
        assert_eq!(cart.size(), 16);
        assert_eq!(cart.fingerprint().len(), 64);

        let seeded = TestPattern::new(240, 160, 60, 0, Some(&cart));
        if cart.palette_seed() != 0 {
            assert_ne!(seeded.current_framebuffer(), pattern().current_framebuffer());
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
