//! # retrocast-core
//!
//! Distribution and session layer for streaming an emulated console's
//! framebuffer and audio to any number of viewers.
//!
//! This crate contains:
//! - **Metrics**: `RingBuffer`, `WindowAverage`: fixed-size sliding windows
//! - **Pipeline**: `FramePipeline`, a two-slot producer/encoder handoff
//! - **Hub**: `Hub`, drop-oldest fan-out from one producer to N subscribers
//! - **Protocol**: JSON control messages, keys and `KeyState`
//! - **Session**: the generic two-loop session engine and the streaming
//!   behavior plugged into it
//! - **Client**: `ReconnectingClient` with backoff, flow control and stats
//! - **Codec**: encoder/decoder traits plus zstd-delta and PCM reference codecs
//! - **Error**: `StreamError`, typed `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod source;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{
    Backoff, ClientHandle, ClientOptions, ClientStats, Connector, FrameSink, InputEvent,
    KeyEventKind, KeyFilter, ReconnectingClient, WsConnector,
};
pub use codec::{
    DeltaDecoder, DeltaEncoder, EncodedFrame, PcmEncoder, VideoConfig, VideoDecoder, VideoEncoder,
};
pub use error::StreamError;
pub use hub::{Hub, SubscriberId, Subscription};
pub use metrics::{RingBuffer, WindowAverage};
pub use pipeline::{FrameBuffer, FramePipeline, PipelineConsumer, PipelineProducer};
pub use protocol::{ClientMessage, FrameKind, Key, KeyState, KeyTransition, ServerMessage};
pub use session::{
    FlowCredit, SessionBehavior, SessionContext, SessionStatus, StreamChannels, StreamSession,
    StreamSettings, run_session,
};
pub use source::{FrameSource, Geometry, PixelFormat};
pub use transport::{WireMessage, WireSink, WireStream};
