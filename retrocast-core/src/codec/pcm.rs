//! Raw PCM for the sound stream: interleaved stereo `i16`, little-endian.

use bytes::{BufMut, BytesMut};

use crate::codec::EncodedFrame;
use crate::error::StreamError;

/// Packs sample batches into sound payloads. Every payload stands alone.
#[derive(Debug, Default)]
pub struct PcmEncoder;

impl PcmEncoder {
    pub fn encode(&self, samples: &[i16]) -> EncodedFrame {
        let mut out = BytesMut::with_capacity(samples.len() * 2);
        for s in samples {
            out.put_i16_le(*s);
        }
        EncodedFrame {
            data: out.freeze(),
            is_key_frame: true,
        }
    }
}

/// Unpack a sound payload into `out` (cleared first).
pub fn decode(payload: &[u8], out: &mut Vec<i16>) -> Result<(), StreamError> {
    if payload.len() % 2 != 0 {
        return Err(StreamError::Codec(format!(
            "odd PCM payload length {}",
            payload.len()
        )));
    }
    out.clear();
    out.extend(
        payload
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]])),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_little_endian() {
        let frame = PcmEncoder.encode(&[1, -1, 0x1234]);
        assert_eq!(&frame.data[..], &[0x01, 0x00, 0xff, 0xff, 0x34, 0x12]);

        let mut out = Vec::new();
        decode(&frame.data, &mut out).unwrap();
        assert_eq!(out, vec![1, -1, 0x1234]);
    }

    #[test]
    fn odd_length_is_rejected() {
        let mut out = vec![7];
        assert!(decode(&[0, 1, 2], &mut out).is_err());
        assert_eq!(out, vec![7]);
    }
}
