//! JSON control messages.
//!
//! # Wire Protocol
//!
//! Every control message is a JSON object discriminated by `action`,
//! carrying its payload under `<action>Action`.
//!
//! ## Client → Server
//! ```text
//! {"action":"key","keyAction":{"key":"A","action":"down"}}
//! {"action":"ping","pingAction":{"madeAt":1234.5}}
//! {"action":"fillToken","fillTokenAction":{"count":1}}
//! {"action":"soundControl","soundControlAction":{"mute":true}}
//! ```
//!
//! ## Server → Client
//! ```text
//! {"action":"init","initAction":{"codec":"zstd-xor"}}
//! {"action":"pong","pongAction":{"madeAt":1234.5}}
//! {"action":"frame","frameAction":{"type":"screen"}}
//! ```
//!
//! A `frame` announcement precedes a binary payload whenever the payload
//! kind differs from the previously announced one.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::protocol::key::{Key, KeyTransition};

// ── Payloads ─────────────────────────────────────────────────────

/// A key edge reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAction {
    pub key: Key,
    pub action: KeyTransition,
}

/// Latency probe; `made_at` is the client's monotonic clock in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingAction {
    #[serde(rename = "madeAt")]
    pub made_at: f64,
}

/// Credit replenishment: the client can absorb `count` more frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillTokenAction {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundControlAction {
    pub mute: bool,
}

/// Announces the codec the session's screen payloads are encoded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitAction {
    pub codec: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PongAction {
    #[serde(rename = "madeAt")]
    pub made_at: f64,
}

/// Which binary stream the following payload(s) belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    #[default]
    Screen,
    Sound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAction {
    #[serde(rename = "type")]
    pub kind: FrameKind,
}

// ── ClientMessage ────────────────────────────────────────────────

/// Messages sent by a viewer to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    Key {
        #[serde(rename = "keyAction")]
        key_action: KeyAction,
    },
    Ping {
        #[serde(rename = "pingAction")]
        ping_action: PingAction,
    },
    FillToken {
        #[serde(rename = "fillTokenAction")]
        fill_token_action: FillTokenAction,
    },
    SoundControl {
        #[serde(rename = "soundControlAction")]
        sound_control_action: SoundControlAction,
    },
}

impl ClientMessage {
    pub fn key(key: Key, action: KeyTransition) -> Self {
        Self::Key {
            key_action: KeyAction { key, action },
        }
    }

    pub fn ping(made_at: f64) -> Self {
        Self::Ping {
            ping_action: PingAction { made_at },
        }
    }

    pub fn fill_token(count: u32) -> Self {
        Self::FillToken {
            fill_token_action: FillTokenAction { count },
        }
    }

    pub fn sound_control(mute: bool) -> Self {
        Self::SoundControl {
            sound_control_action: SoundControlAction { mute },
        }
    }

    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StreamError> {
        serde_json::from_str(text).map_err(|e| StreamError::MalformedMessage(e.to_string()))
    }
}

// ── ServerMessage ────────────────────────────────────────────────

/// Messages sent by the server to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServerMessage {
    Init {
        #[serde(rename = "initAction")]
        init_action: InitAction,
    },
    Pong {
        #[serde(rename = "pongAction")]
        pong_action: PongAction,
    },
    Frame {
        #[serde(rename = "frameAction")]
        frame_action: FrameAction,
    },
}

impl ServerMessage {
    pub fn init(codec: impl Into<String>) -> Self {
        Self::Init {
            init_action: InitAction {
                codec: codec.into(),
            },
        }
    }

    pub fn pong(made_at: f64) -> Self {
        Self::Pong {
            pong_action: PongAction { made_at },
        }
    }

    pub fn frame(kind: FrameKind) -> Self {
        Self::Frame {
            frame_action: FrameAction { kind },
        }
    }

    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StreamError> {
        serde_json::from_str(text).map_err(|e| StreamError::MalformedMessage(e.to_string()))
    }
}

// ── Tests ────────────────────────────────────────────────────────
