//! Decoding side of the viewer: turns demultiplexed payloads back into
//! framebuffers and PCM.

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{info, warn};

use retrocast_core::client::FrameSink;
use retrocast_core::codec::{DeltaDecoder, VideoDecoder, delta, pcm};
use retrocast_core::error::StreamError;
use retrocast_core::source::Geometry;

/// Latest decoded frame plus running totals.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub frame: Option<Bytes>,
    pub frames: u64,
    pub samples: u64,
}

/// [`FrameSink`] that decodes screen payloads with the delta codec and
/// publishes the newest frame on a watch channel.
pub struct ViewerSink {
    decoder: DeltaDecoder,
    audio: Vec<i16>,
    latest: watch::Sender<Decoded>,
}

impl ViewerSink {
    pub fn new(geometry: Geometry) -> (Self, watch::Receiver<Decoded>) {
        let (latest, rx) = watch::channel(Decoded::default());
        let sink = Self {
            decoder: DeltaDecoder::new(geometry.byte_len()),
            audio: Vec::new(),
            latest,
        };
        (sink, rx)
    }
}

impl FrameSink for ViewerSink {
    fn on_codec(&mut self, codec: &str) {
        if codec == delta::CODEC_ID {
            info!(codec, "stream codec");
        } else {
            warn!(codec, expected = delta::CODEC_ID, "unsupported codec");
        }
    }

    fn on_screen(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let frame = Bytes::copy_from_slice(self.decoder.decode(payload)?);
        self.latest.send_modify(|d| {
            d.frame = Some(frame);
            d.frames += 1;
        });
        Ok(())
    }

    fn on_sound(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        self.audio.clear();
        pcm::decode(payload, &mut self.audio)?;
        // No audio device; only the sample count is kept.
        let n = self.audio.len() as u64;
        self.latest.send_modify(|d| d.samples += n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrocast_core::codec::{DeltaEncoder, PcmEncoder, VideoConfig, VideoEncoder};
    use retrocast_core::pipeline::FramePipeline;
    use retrocast_core::protocol::KeyState;
    use retrocast_core::source::{FrameSource, PixelFormat};
    use tokio_util::sync::CancellationToken;

    const GEOMETRY: Geometry = Geometry::new(4, 4, PixelFormat::Rgb565);

    struct Solid(Vec<u8>);

    impl FrameSource for Solid {
        fn geometry(&self) -> Geometry {
            GEOMETRY
        }
        fn advance_one_frame(&mut self) -> u64 {
            1
        }
        fn current_framebuffer(&self) -> &[u8] {
            &self.0
        }
        fn set_keys(&mut self, _keys: KeyState) {}
    }

    #[tokio::test]
    async fn decodes_screen_and_counts_samples() {
        let (mut sink, rx) = ViewerSink::new(GEOMETRY);
        let mut enc = DeltaEncoder::new(1);
        enc.configure(VideoConfig {
            geometry: GEOMETRY,
            fps: 60,
            bitrate: 1_000_000,
            key_frame_interval: 10,
        })
        .unwrap();

        let (mut producer, mut consumer) = FramePipeline::new(GEOMETRY);
        let cancel = CancellationToken::new();
        let source = Solid(vec![7; GEOMETRY.byte_len()]);
        producer.enqueue_frame(&source, &cancel).await.unwrap();
        let encoded = consumer
            .dequeue_frame(|f| enc.encode_frame(f), &cancel)
            .await
            .unwrap()
            .unwrap();

        sink.on_screen(&encoded[0].data).unwrap();
        sink.on_sound(&PcmEncoder.encode(&[1, 2, 3, 4]).data).unwrap();

        let decoded = rx.borrow().clone();
        assert_eq!(decoded.frames, 1);
        assert_eq!(decoded.samples, 4);
        assert_eq!(decoded.frame.unwrap().as_ref(), &[7u8; 32][..]);
    }

    #[test]
    fn garbage_is_rejected_without_publishing() {
        let (mut sink, rx) = ViewerSink::new(GEOMETRY);
        assert!(sink.on_screen(&[0xFF]).is_err());
        assert!(sink.on_sound(&[1, 2, 3]).is_err());
        assert_eq!(rx.borrow().frames, 0);
    }
}
