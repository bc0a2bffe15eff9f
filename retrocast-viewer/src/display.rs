//! Headless display: converts RGB565 frames to RGB8 and writes PPM
//! snapshots.

use std::io::Write;
use std::path::Path;

use retrocast_core::error::StreamError;
use retrocast_core::source::Geometry;

/// Expand little-endian RGB565 to packed RGB8.
pub fn rgb565_to_rgb8(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() / 2 * 3);
    for px in frame.chunks_exact(2) {
        let v = u16::from_le_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1F) as u8;
        let g = ((v >> 5) & 0x3F) as u8;
        let b = (v & 0x1F) as u8;
        out.extend_from_slice(&[(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]);
    }
    out
}

/// Write one frame as a binary PPM (P6).
pub fn write_ppm(path: &Path, geometry: Geometry, frame: &[u8]) -> Result<(), StreamError> {
    if frame.len() != geometry.byte_len() {
        return Err(StreamError::Codec(format!(
            "frame is {} bytes, expected {}",
            frame.len(),
            geometry.byte_len()
        )));
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write!(file, "P6\n{} {}\n255\n", geometry.width, geometry.height)?;
    file.write_all(&rgb565_to_rgb8(frame))?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrocast_core::source::PixelFormat;

    #[test]
    fn primaries_expand_to_full_range() {
        let frame = [
            0xF800u16.to_le_bytes(),
            0x07E0u16.to_le_bytes(),
            0x001Fu16.to_le_bytes(),
            0x0000u16.to_le_bytes(),
        ]
        .concat();
        assert_eq!(
            rgb565_to_rgb8(&frame),
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0]
        );
    }

    #[test]
    fn ppm_has_header_and_pixels() {
        let geometry = Geometry::new(2, 1, PixelFormat::Rgb565);
        let path = std::env::temp_dir().join(format!("retrocast-{}.ppm", std::process::id()));
        write_ppm(&path, geometry, &[0xFF; 4]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(bytes.len(), 11 + 6);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn wrong_size_frame_is_rejected() {
        let geometry = Geometry::new(2, 2, PixelFormat::Rgb565);
        let path = std::env::temp_dir().join("retrocast-never-written.ppm");
        assert!(write_ppm(&path, geometry, &[0; 3]).is_err());
    }
}
