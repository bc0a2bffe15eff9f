//! HTTP surface: the `/stream` WebSocket endpoint and `/status`.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use futures::{SinkExt, StreamExt, future};
use tracing::info;

use retrocast_core::error::StreamError;
use retrocast_core::session::{StreamSession, run_session};
use retrocast_core::transport::{WireMessage, WireSink, WireStream};

use crate::host::{StatusReport, StreamHost};

pub fn router(host: Arc<StreamHost>) -> Router {
    Router::new()
        .route("/stream", get(stream_upgrade))
        .route("/status", get(status))
        .with_state(host)
}

async fn status(State(host): State<Arc<StreamHost>>) -> Json<StatusReport> {
    Json(host.status())
}

async fn stream_upgrade(
    ws: WebSocketUpgrade,
    State(host): State<Arc<StreamHost>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_viewer(host, socket))
}

/// Run one viewer session to completion.
async fn serve_viewer(host: Arc<StreamHost>, socket: WebSocket) {
    let id = host.next_session_id();
    info!(session = id, "viewer connected");
    let (sink, stream) = split_axum(socket);
    let session = StreamSession::new(Arc::clone(host.channels()));
    // Errors are already logged by the engine.
    let _ = run_session(id, &session, sink, stream, host.shutdown()).await;
}

// ── axum adapter ─────────────────────────────────────────────────

/// Adapt an axum WebSocket to the transport-neutral halves.
fn split_axum(socket: WebSocket) -> (WireSink, WireStream) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e| StreamError::WebSocket(e.to_string()))
        .with(|msg: WireMessage| future::ready(Ok::<_, StreamError>(into_axum(msg))));
    let stream = stream.filter_map(|res| {
        future::ready(match res {
            Ok(msg) => from_axum(msg).map(Ok),
            Err(e) => Some(Err(StreamError::WebSocket(e.to_string()))),
        })
    });
    (Box::pin(sink), Box::pin(stream))
}

fn from_axum(msg: Message) -> Option<WireMessage> {
    match msg {
        Message::Text(text) => Some(WireMessage::Text(text)),
        Message::Binary(data) => Some(WireMessage::Binary(data.into())),
        Message::Close(_) => Some(WireMessage::Close),
        // Pings are answered by axum itself.
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

fn into_axum(msg: WireMessage) -> Message {
    match msg {
        WireMessage::Text(text) => Message::Text(text),
        WireMessage::Binary(data) => Message::Binary(data.to_vec()),
        WireMessage::Close => Message::Close(None),
    }
}
