//! Viewer side of the session protocol.
//!
//! | Module      | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `backoff`   | Doubling reconnect delay with a ceiling          |
//! | `input`     | Auto-repeat suppression for local key events     |
//! | `stats`     | FPS / frame-gap / RTT indicators                 |
//! | `reconnect` | Connection loop, demultiplexing, flow control    |
//! | `ws`        | tokio-tungstenite connector                      |

pub mod backoff;
pub mod input;
pub mod reconnect;
pub mod stats;
pub mod ws;

pub use backoff::Backoff;
pub use input::{InputEvent, KeyEventKind, KeyFilter};
pub use reconnect::{ClientHandle, ClientOptions, Connector, FrameSink, ReconnectingClient};
pub use stats::{ClientStats, FrameClock};
pub use ws::WsConnector;
