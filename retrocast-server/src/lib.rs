//! # retrocast-server
//!
//! Runs a frame source at a fixed rate, encodes what it draws and fans
//! screen and sound out to every connected viewer over WebSocket.
//!
//! ## Endpoints
//!
//! - `GET /stream`: WebSocket upgrade; one streaming session per socket.
//! - `GET /status`: JSON `{fps, bitrate, uptime, activeConnections, codec}`.

pub mod app;
pub mod config;
pub mod emulator;
pub mod host;
pub mod producer;
pub mod routes;
