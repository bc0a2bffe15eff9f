//! The viewer's connection loop.
//!
//! ```text
//!         ┌──────────────────────────────────────────────┐
//!         ▼                                              │
//!   Connecting ──ok──► Connected ──close/error──► Disconnected
//!         │                                      (sleep backoff)
//!         └──fail──────────────────────────────────────► ┘
//! ```
//!
//! While connected, one loop demultiplexes incoming messages, forwards
//! filtered key input, returns one `fillToken` per screen frame and
//! publishes [`ClientStats`] on a fixed interval.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::backoff::Backoff;
use crate::client::input::{InputEvent, KeyFilter};
use crate::client::stats::{ClientStats, FrameClock};
use crate::error::StreamError;
use crate::metrics::WindowAverage;
use crate::protocol::{ClientMessage, FrameKind, ServerMessage};
use crate::session::SessionStatus;
use crate::transport::{WireMessage, WireSink, WireStream};

/// Local key events queued for the connection loop.
const INPUT_QUEUE: usize = 64;

// ── Seams ────────────────────────────────────────────────────────

/// Opens one transport to the server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(WireSink, WireStream), StreamError>;
}

/// Consumer of demultiplexed payloads (decoder + display).
pub trait FrameSink: Send {
    fn on_codec(&mut self, _codec: &str) {}

    fn on_screen(&mut self, payload: &[u8]) -> Result<(), StreamError>;

    fn on_sound(&mut self, payload: &[u8]) -> Result<(), StreamError>;
}

// ── ClientOptions ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// How often [`ClientStats`] are recomputed.
    pub refresh_interval: Duration,
    /// Pongs averaged into the RTT estimate.
    pub rtt_window: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            refresh_interval: Duration::from_millis(1000),
            rtt_window: 16,
        }
    }
}

// ── ClientHandle ─────────────────────────────────────────────────

/// Caller-side view of a running client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub input: mpsc::Sender<InputEvent>,
    pub status: watch::Receiver<SessionStatus>,
    pub stats: watch::Receiver<ClientStats>,
}

// ── ReconnectingClient ───────────────────────────────────────────

pub struct ReconnectingClient<C, S> {
    connector: C,
    frames: S,
    options: ClientOptions,
    backoff: Backoff,
    keys: KeyFilter,
    input: mpsc::Receiver<InputEvent>,
    status: watch::Sender<SessionStatus>,
    stats: watch::Sender<ClientStats>,
    rtt: WindowAverage,
    codec: Option<String>,
    epoch: Instant,
}

impl<C, S> ReconnectingClient<C, S>
where
    C: Connector,
    S: FrameSink,
{
    pub fn new(
        connector: C,
        frames: S,
        options: ClientOptions,
    ) -> Result<(Self, ClientHandle), StreamError> {
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Connecting);
        let (stats_tx, stats_rx) = watch::channel(ClientStats::default());

        let client = Self {
            connector,
            frames,
            options,
            backoff: Backoff::new(options.initial_backoff, options.max_backoff),
            keys: KeyFilter::default(),
            input: input_rx,
            status: status_tx,
            stats: stats_tx,
            rtt: WindowAverage::new(options.rtt_window)?,
            codec: None,
            epoch: Instant::now(),
        };
        let handle = ClientHandle {
            input: input_tx,
            status: status_rx,
            stats: stats_rx,
        };
        Ok((client, handle))
    }

    /// Connect, serve, and reconnect until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            self.set_status(SessionStatus::Connecting);
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok((sink, stream)) => {
                    self.backoff.reset();
                    self.keys.reset();
                    self.set_status(SessionStatus::connected_now());
                    info!("connected");
                    match self.serve(sink, stream, &cancel).await {
                        Ok(()) => info!("connection closed"),
                        Err(e) => warn!(error = %e, "connection lost"),
                    }
                }
                Err(e) => warn!(error = %e, "connect failed"),
            }

            if cancel.is_cancelled() {
                break;
            }
            self.set_status(SessionStatus::Disconnected);
            let delay = self.backoff.next_delay();
            info!(?delay, "reconnecting");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.set_status(SessionStatus::Shutdown);
    }

    fn set_status(&self, status: SessionStatus) {
        debug!(%status, "status");
        self.status.send_replace(status.clone());
        self.stats.send_modify(|s| s.status = status);
    }

    /// Client-monotonic timestamp in milliseconds, as carried by pings.
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    async fn serve(
        &mut self,
        mut sink: WireSink,
        mut stream: WireStream,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        let mut announced = FrameKind::default();
        let mut clock = FrameClock::new(Instant::now());
        let mut ticker = tokio::time::interval(self.options.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = sink.send(WireMessage::Close).await;
                    return Ok(());
                }
                msg = stream.next() => match msg {
                    None | Some(Ok(WireMessage::Close)) => return Ok(()),
                    Some(Err(e)) => return Err(e),
                    Some(Ok(WireMessage::Text(text))) => {
                        if let Some(kind) = self.on_control(&text) {
                            announced = kind;
                        }
                    }
                    Some(Ok(WireMessage::Binary(payload))) => match announced {
                        FrameKind::Screen => {
                            if let Err(e) = self.frames.on_screen(&payload) {
                                warn!(error = %e, "screen payload rejected");
                            }
                            clock.record_frame(Instant::now());
                            sink.send(WireMessage::json(&ClientMessage::fill_token(1))?).await?;
                        }
                        FrameKind::Sound => {
                            if let Err(e) = self.frames.on_sound(&payload) {
                                warn!(error = %e, "sound payload rejected");
                            }
                        }
                    },
                },
                Some(event) = self.input.recv() => {
                    if let Some(transition) = self.keys.accept(event) {
                        sink.send(WireMessage::json(&ClientMessage::key(event.key, transition))?)
                            .await?;
                        sink.send(WireMessage::json(&ClientMessage::ping(self.now_ms()))?)
                            .await?;
                    }
                }
                _ = ticker.tick() => {
                    let (fps, worst_frame_gap) = clock.roll(Instant::now());
                    let rtt_ms = (!self.rtt.is_empty()).then(|| self.rtt.average());
                    let codec = self.codec.clone();
                    self.stats.send_modify(|s| {
                        s.fps = fps;
                        s.worst_frame_gap = worst_frame_gap;
                        s.rtt_ms = rtt_ms;
                        s.codec = codec;
                    });
                }
            }
        }
    }

    /// Route one JSON message; returns a new frame announcement if any.
    fn on_control(&mut self, text: &str) -> Option<FrameKind> {
        let msg = match ServerMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "skipping malformed server message");
                return None;
            }
        };
        match msg {
            ServerMessage::Init { init_action } => {
                info!(codec = %init_action.codec, "stream initialised");
                self.frames.on_codec(&init_action.codec);
                self.codec = Some(init_action.codec);
                None
            }
            ServerMessage::Pong { pong_action } => {
                let rtt = self.now_ms() - pong_action.made_at;
                if rtt >= 0.0 {
                    self.rtt.add_sample(rtt);
                }
                None
            }
            ServerMessage::Frame { frame_action } => Some(frame_action.kind),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
