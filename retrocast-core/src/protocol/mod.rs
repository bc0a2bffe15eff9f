//! Wire protocol shared by the server session engine and the client.
//!
//! Every session is one WebSocket. Binary messages carry encoded frame
//! payloads; text messages carry the JSON control messages defined in
//! [`message`]. Keys and their pressed-state bitmask live in [`key`].

pub mod key;
pub mod message;

pub use key::{Key, KeyState, KeyTransition};
pub use message::{
    ClientMessage, FillTokenAction, FrameAction, FrameKind, InitAction, KeyAction, PingAction,
    PongAction, ServerMessage, SoundControlAction,
};
