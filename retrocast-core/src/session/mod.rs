//! Per-connection session protocol.
//!
//! [`engine`] holds the generic two-loop runner; [`stream`] is the
//! behavior the server plugs into it for viewers.

pub mod credit;
pub mod engine;
pub mod status;
pub mod stream;

pub use credit::FlowCredit;
pub use engine::{Outbound, SessionBehavior, SessionContext, SessionId, run_session};
pub use status::SessionStatus;
pub use stream::{StreamChannels, StreamSession, StreamSettings};
