//! Frame production and encoding loops.
//!
//! ```text
//!  run_producer                     run_encoder
//!  set_keys → advance_one_frame     dequeue_frame → encode_frame
//!  drain_audio → sound hub          → screen hub
//!  enqueue_frame ──── pipeline ───► stats + adjust_quality (1 s)
//! ```
//!
//! The producer ticks at the configured rate whether or not anyone is
//! watching; the framebuffer copy is skipped while the screen hub has
//! no subscribers, so an idle server does no encoding work.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use retrocast_core::codec::{PcmEncoder, VideoEncoder};
use retrocast_core::error::StreamError;
use retrocast_core::metrics::WindowAverage;
use retrocast_core::pipeline::{PipelineConsumer, PipelineProducer};
use retrocast_core::session::StreamChannels;
use retrocast_core::source::FrameSource;

use crate::host::{ProducerStats, StreamHost};

/// How often encoder stats are rolled and quality is adapted.
pub const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Bitrate samples averaged before adapting quality.
const BITRATE_WINDOW: usize = 4;

// ── Producer ─────────────────────────────────────────────────────

/// Drive `source` one frame per tick until `cancel` fires.
pub async fn run_producer<S>(
    mut source: S,
    mut frames: PipelineProducer,
    channels: Arc<StreamChannels>,
    fps: u32,
    cancel: CancellationToken,
) -> Result<(), StreamError>
where
    S: FrameSource,
{
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let pcm = PcmEncoder;
    let mut audio = Vec::new();

    while !cancel.is_cancelled() {
        let loop_start = Instant::now();

        // 1. Step the source with the keys viewers currently hold.
        source.set_keys(channels.keys());
        source.advance_one_frame();

        // 2. Audio goes straight to the sound hub.
        source.drain_audio(&mut audio);
        if !audio.is_empty() {
            if channels.sound.subscriber_count() > 0 {
                channels.sound.publish(pcm.encode(&audio));
            }
            audio.clear();
        }

        // 3. Hand the framebuffer to the encoder, unless nobody watches.
        if channels.screen.subscriber_count() > 0 {
            match frames.enqueue_frame(&source, &cancel).await {
                Ok(_) => {}
                Err(StreamError::Canceled) => break,
                Err(e) => return Err(e),
            }
        }

        // 4. Frame pacing.
        pace(loop_start, frame_interval, &cancel).await;
    }

    debug!("producer stopped");
    Ok(())
}

/// Sleep for the remainder of the frame interval.
async fn pace(loop_start: Instant, interval: Duration, cancel: &CancellationToken) {
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(interval - elapsed) => {}
        }
    }
}

// ── Encoder ──────────────────────────────────────────────────────

/// Encode every frame the producer hands over and publish the result.
pub async fn run_encoder<E>(
    mut encoder: E,
    mut frames: PipelineConsumer,
    host: Arc<StreamHost>,
    cancel: CancellationToken,
) -> Result<(), StreamError>
where
    E: VideoEncoder,
{
    let channels = Arc::clone(host.channels());
    let mut meter = RateMeter::new(Instant::now())?;
    let mut ticker = tokio::time::interval_at(Instant::now() + STATS_INTERVAL, STATS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(codec = encoder.codec_id(), "encoder started");

    loop {
        let encoded = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let stats = meter.roll(Instant::now());
                if stats.fps > 0.0 {
                    encoder.adjust_quality(stats.bitrate as u64);
                }
                host.publish_stats(stats);
                continue;
            }
            res = frames.dequeue_frame(
                |frame| {
                    if channels.take_key_frame_request() {
                        encoder.request_key_frame();
                    }
                    encoder.encode_frame(frame)
                },
                &cancel,
            ) => match res {
                Ok(Ok(encoded)) => encoded,
                // One bad frame must not take the stream down; the next
                // frame restarts the chain from a key frame.
                Ok(Err(e)) => {
                    warn!(error = %e, "encode failed, frame skipped");
                    encoder.request_key_frame();
                    continue;
                }
                Err(StreamError::Canceled) => break,
                Err(e) => return Err(e),
            },
        };

        for frame in encoded {
            meter.record(frame.bits());
            channels.screen.publish(frame);
        }
    }

    debug!("encoder stopped");
    Ok(())
}

// ── RateMeter ────────────────────────────────────────────────────

/// Frame and bit counters over one stats interval.
struct RateMeter {
    since: Instant,
    frames: u64,
    bits: u64,
    bitrate: WindowAverage,
}

impl RateMeter {
    fn new(now: Instant) -> Result<Self, StreamError> {
        Ok(Self {
            since: now,
            frames: 0,
            bits: 0,
            bitrate: WindowAverage::new(BITRATE_WINDOW)?,
        })
    }

    fn record(&mut self, bits: u64) {
        self.frames += 1;
        self.bits += bits;
    }

    /// Close the current interval and start a new one at `now`.
    fn roll(&mut self, now: Instant) -> ProducerStats {
        let secs = now.duration_since(self.since).as_secs_f64();
        let (fps, bps) = if secs > 0.0 {
            (self.frames as f64 / secs, self.bits as f64 / secs)
        } else {
            (0.0, 0.0)
        };
        self.bitrate.add_sample(bps);
        self.since = now;
        self.frames = 0;
        self.bits = 0;
        ProducerStats {
            fps,
            bitrate: self.bitrate.average(),
        }
    }
}
