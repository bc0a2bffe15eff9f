//! The streaming session: fan screen and sound frames out to one viewer
//! and apply its control messages.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::codec::EncodedFrame;
use crate::error::StreamError;
use crate::hub::Hub;
use crate::protocol::{ClientMessage, FrameKind, Key, KeyState, KeyTransition, ServerMessage};
use crate::session::credit::FlowCredit;
use crate::session::engine::{Outbound, SessionBehavior, SessionContext};
use crate::transport::WireMessage;

// ── StreamSettings ───────────────────────────────────────────────

/// Per-session knobs, shared by every session of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Subscriber queue length for screen frames. 1 = latest frame wins.
    pub screen_queue: usize,
    pub sound_queue: usize,
    /// Drop screen frames when the viewer has no credit left.
    pub flow_control: bool,
    pub initial_credits: u32,
    pub max_credits: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            screen_queue: 1,
            sound_queue: 8,
            flow_control: true,
            initial_credits: 4,
            max_credits: 8,
        }
    }
}

// ── StreamChannels ───────────────────────────────────────────────

/// State shared between the producer and every streaming session.
pub struct StreamChannels {
    pub screen: Hub<EncodedFrame>,
    pub sound: Hub<EncodedFrame>,
    codec: String,
    keys: AtomicU16,
    key_frame_requested: AtomicBool,
    settings: StreamSettings,
}

impl StreamChannels {
    pub fn new(
        screen: Hub<EncodedFrame>,
        sound: Hub<EncodedFrame>,
        codec: impl Into<String>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            screen,
            sound,
            codec: codec.into(),
            keys: AtomicU16::new(0),
            key_frame_requested: AtomicBool::new(false),
            settings,
        }
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Keys currently held by any viewer.
    pub fn keys(&self) -> KeyState {
        KeyState::from_bits_truncate(self.keys.load(Ordering::Acquire))
    }

    pub fn apply_key(&self, key: Key, transition: KeyTransition) {
        let bit = key.flag().bits();
        match transition {
            KeyTransition::Down => self.keys.fetch_or(bit, Ordering::AcqRel),
            KeyTransition::Up => self.keys.fetch_and(!bit, Ordering::AcqRel),
        };
    }

    /// Clear every key in `held`.
    pub fn release_keys(&self, held: KeyState) {
        if !held.is_empty() {
            self.keys.fetch_and(!held.bits(), Ordering::AcqRel);
        }
    }

    /// Ask the encoder for a key frame (a viewer joined or lost one).
    pub fn request_key_frame(&self) {
        self.key_frame_requested.store(true, Ordering::Release);
    }

    /// Consume a pending key frame request.
    pub fn take_key_frame_request(&self) -> bool {
        self.key_frame_requested.swap(false, Ordering::AcqRel)
    }
}

// ── StreamSession ────────────────────────────────────────────────

/// One viewer's session state; built per connection.
pub struct StreamSession {
    channels: Arc<StreamChannels>,
    credits: FlowCredit,
    muted: AtomicBool,
    /// Keys this viewer pressed and has not released.
    held: AtomicU16,
    last_ping_at: Mutex<Option<Instant>>,
}

impl StreamSession {
    pub fn new(channels: Arc<StreamChannels>) -> Self {
        let s = channels.settings;
        Self {
            credits: FlowCredit::new(s.initial_credits, s.max_credits, s.flow_control),
            channels,
            muted: AtomicBool::new(false),
            held: AtomicU16::new(0),
            last_ping_at: Mutex::new(None),
        }
    }

    pub fn held_keys(&self) -> KeyState {
        KeyState::from_bits_truncate(self.held.load(Ordering::Acquire))
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn credits(&self) -> &FlowCredit {
        &self.credits
    }

    pub fn last_ping_at(&self) -> Option<Instant> {
        *self.last_ping_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce (if the kind changed) then write one payload.
    async fn send_frame(
        out: &mut Outbound,
        announced: &mut Option<FrameKind>,
        kind: FrameKind,
        frame: EncodedFrame,
    ) -> Result<(), StreamError> {
        if *announced != Some(kind) {
            out.send_json(&ServerMessage::frame(kind)).await?;
            *announced = Some(kind);
        }
        out.send(WireMessage::Binary(frame.data)).await
    }
}

#[async_trait]
impl SessionBehavior for StreamSession {
    type Request = ClientMessage;

    async fn handle(&self, request: ClientMessage, ctx: &SessionContext) -> Result<(), StreamError> {
        match request {
            ClientMessage::Key { key_action } => {
                debug!(session = ctx.id(), key = %key_action.key, action = ?key_action.action, "key");
                let bit = key_action.key.flag().bits();
                match key_action.action {
                    KeyTransition::Down => self.held.fetch_or(bit, Ordering::AcqRel),
                    KeyTransition::Up => self.held.fetch_and(!bit, Ordering::AcqRel),
                };
                self.channels.apply_key(key_action.key, key_action.action);
            }
            ClientMessage::Ping { ping_action } => {
                *self.last_ping_at.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Instant::now());
                ctx.reply(&ServerMessage::pong(ping_action.made_at))?;
            }
            ClientMessage::FillToken { fill_token_action } => {
                self.credits.add(fill_token_action.count);
            }
            ClientMessage::SoundControl {
                sound_control_action,
            } => {
                debug!(session = ctx.id(), mute = sound_control_action.mute, "sound control");
                self.muted
                    .store(sound_control_action.mute, Ordering::Release);
            }
        }
        Ok(())
    }

    async fn outbound(
        &self,
        out: &mut Outbound,
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        let settings = self.channels.settings;
        // Dropping these on any exit path deregisters from the hubs.
        let mut screen = self.channels.screen.subscribe(settings.screen_queue)?;
        let mut sound = self.channels.sound.subscribe(settings.sound_queue)?;

        out.send_json(&ServerMessage::init(self.channels.codec()))
            .await?;
        self.channels.request_key_frame();

        let mut announced: Option<FrameKind> = None;
        // While set, only a key frame may go out.
        let mut need_key = true;
        let mut lost = screen.dropped();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                Some(reply) = out.next_reply() => out.send(reply).await?,
                frame = screen.recv() => {
                    let Some(frame) = frame else { return Ok(()) };
                    // The queue evicted something; it may have been a key frame.
                    if screen.dropped() != lost {
                        lost = screen.dropped();
                        need_key |= !frame.is_key_frame;
                    }
                    if need_key && !frame.is_key_frame {
                        trace!(session = ctx.id(), "waiting for key frame, dropping delta");
                        self.channels.request_key_frame();
                    } else if self.credits.try_take() {
                        let is_key = frame.is_key_frame;
                        Self::send_frame(out, &mut announced, FrameKind::Screen, frame).await?;
                        need_key &= !is_key;
                    } else {
                        trace!(session = ctx.id(), "no credit, dropping screen frame");
                        if frame.is_key_frame {
                            need_key = true;
                            self.channels.request_key_frame();
                        }
                    }
                }
                frame = sound.recv() => {
                    let Some(frame) = frame else { return Ok(()) };
                    if !self.is_muted() {
                        Self::send_frame(out, &mut announced, FrameKind::Sound, frame).await?;
                    }
                }
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // A vanished viewer never sends its key-up events.
        self.channels.release_keys(self.held_keys());
    }
}

// ── Tests ────────────────────────────────────────────────────────
