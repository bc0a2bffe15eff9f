//! Transport-neutral message type for sessions.
//!
//! The session engine and the client only see [`WireMessage`]s flowing
//! through a boxed `Sink` / `Stream` pair, so the same code runs over
//! tokio-tungstenite, the server's WebSocket upgrade, or an in-memory
//! channel in tests. Ping/pong control frames are answered by the
//! WebSocket layer itself and never surface here.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::StreamError;

/// One logical message on a session transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A JSON control message.
    Text(String),
    /// An encoded frame payload.
    Binary(Bytes),
    /// Orderly close by either side.
    Close,
}

impl WireMessage {
    /// Serialize a control message to a `Text` frame.
    pub fn json<M: Serialize>(msg: &M) -> Result<Self, StreamError> {
        Ok(WireMessage::Text(serde_json::to_string(msg)?))
    }

    /// Map a tungstenite frame; transport-level pings and raw frames map
    /// to `None`.
    pub fn from_tungstenite(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(WireMessage::Text(text)),
            Message::Binary(data) => Some(WireMessage::Binary(Bytes::from(data))),
            Message::Close(_) => Some(WireMessage::Close),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }

    pub fn into_tungstenite(self) -> Message {
        match self {
            WireMessage::Text(text) => Message::Text(text),
            WireMessage::Binary(data) => Message::Binary(data.to_vec()),
            WireMessage::Close => Message::Close(None),
        }
    }
}

/// Outgoing half of a session transport.
pub type WireSink = Pin<Box<dyn Sink<WireMessage, Error = StreamError> + Send>>;

/// Incoming half of a session transport.
pub type WireStream = Pin<Box<dyn Stream<Item = Result<WireMessage, StreamError>> + Send>>;

/// Split a tokio-tungstenite socket into a [`WireSink`] / [`WireStream`].
pub fn split_tungstenite<S>(ws: WebSocketStream<S>) -> (WireSink, WireStream)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    let sink = sink.with(|msg: WireMessage| {
        future::ready(Ok::<_, StreamError>(msg.into_tungstenite()))
    });
    let stream = stream.filter_map(|frame| {
        future::ready(match frame {
            Ok(msg) => WireMessage::from_tungstenite(msg).map(Ok),
            Err(e) => Some(Err(StreamError::from(e))),
        })
    });
    (Box::pin(sink), Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tungstenite_mapping() {
        let bin = WireMessage::Binary(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(
            WireMessage::from_tungstenite(bin.clone().into_tungstenite()),
            Some(bin)
        );
        assert_eq!(
            WireMessage::from_tungstenite(Message::Close(None)),
            Some(WireMessage::Close)
        );
        assert_eq!(WireMessage::from_tungstenite(Message::Ping(vec![1])), None);
    }

    #[test]
    fn json_helper_produces_text() {
        let msg = WireMessage::json(&crate::protocol::ServerMessage::pong(5.0)).unwrap();
        let WireMessage::Text(text) = msg else {
            panic!("expected text frame");
        };
        assert!(text.contains("\"pong\""));
    }
}
