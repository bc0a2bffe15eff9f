//! # retrocast-viewer
//!
//! Headless viewer for a retrocast server. Connects over WebSocket,
//! reconnects with backoff, decodes the screen stream, forwards key
//! events typed on stdin and logs connection stats.

pub mod config;
pub mod decoder;
pub mod display;
pub mod input;
