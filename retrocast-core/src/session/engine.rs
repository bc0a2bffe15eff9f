//! Generic two-loop session engine.
//!
//! One connection runs two loops under one cancellation scope:
//!
//! - **inbound** reads text messages, parses them as the behavior's
//!   `Request` type and hands them to [`SessionBehavior::handle`];
//! - **outbound** is supplied by the behavior and owns the sink.
//!
//! Whichever loop ends first cancels the other. Replies produced while
//! handling a request travel to the outbound loop through a small
//! channel, so the sink has exactly one writer.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::transport::{WireMessage, WireSink, WireStream};

/// Control replies buffered between the two loops.
const REPLY_QUEUE: usize = 32;

pub type SessionId = u64;

// ── SessionBehavior ──────────────────────────────────────────────

/// What a session does; the engine supplies the loops around it.
#[async_trait]
pub trait SessionBehavior: Send + Sync {
    /// Control message type read from text frames.
    type Request: DeserializeOwned + Send;

    /// Apply one parsed request. An error ends the session.
    async fn handle(&self, request: Self::Request, ctx: &SessionContext)
    -> Result<(), StreamError>;

    /// Drive the sink until `cancel` fires or there is nothing left to
    /// send. Must forward [`Outbound::next_reply`] items.
    async fn outbound(
        &self,
        out: &mut Outbound,
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError>;
}

// ── SessionContext ───────────────────────────────────────────────

/// Per-session handle shared by both loops.
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    replies: mpsc::Sender<WireMessage>,
}

impl SessionContext {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue a control reply for the outbound loop.
    ///
    /// Never waits: if the outbound loop is that far behind, the reply is
    /// dropped and logged.
    pub fn reply<M: Serialize>(&self, msg: &M) -> Result<(), StreamError> {
        let wire = WireMessage::json(msg)?;
        match self.replies.try_send(wire) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = self.id, "reply queue full, dropping reply");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(StreamError::ChannelClosed),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────

/// The single writer of a session's transport.
pub struct Outbound {
    sink: WireSink,
    replies: mpsc::Receiver<WireMessage>,
}

impl Outbound {
    pub async fn send(&mut self, msg: WireMessage) -> Result<(), StreamError> {
        self.sink.send(msg).await
    }

    pub async fn send_json<M: Serialize>(&mut self, msg: &M) -> Result<(), StreamError> {
        self.send(WireMessage::json(msg)?).await
    }

    /// Next reply queued by the inbound loop.
    pub async fn next_reply(&mut self) -> Option<WireMessage> {
        self.replies.recv().await
    }

    /// Forward replies until canceled; for behaviors with no data stream.
    pub async fn pump_replies(&mut self, cancel: &CancellationToken) -> Result<(), StreamError> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                reply = self.replies.recv() => match reply {
                    Some(msg) => self.send(msg).await?,
                    None => return Ok(()),
                },
            }
        }
    }

    /// Send whatever replies were queued before the loops stopped.
    async fn flush_replies(&mut self) {
        while let Ok(msg) = self.replies.try_recv() {
            if self.sink.send(msg).await.is_err() {
                break;
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WireMessage::Close).await;
        let _ = self.sink.close().await;
    }
}

// ── run_session ──────────────────────────────────────────────────

/// Serve one connection until either loop ends or `shutdown` fires.
///
/// Both loops are awaited before returning, so every resource the
/// behavior acquired (hub subscriptions in particular) has been released
/// by the time this resolves.
pub async fn run_session<B>(
    id: SessionId,
    behavior: &B,
    sink: WireSink,
    mut stream: WireStream,
    shutdown: &CancellationToken,
) -> Result<(), StreamError>
where
    B: SessionBehavior,
{
    let cancel = shutdown.child_token();
    let (replies_tx, replies_rx) = mpsc::channel(REPLY_QUEUE);
    let ctx = SessionContext {
        id,
        replies: replies_tx,
    };
    let mut out = Outbound {
        sink,
        replies: replies_rx,
    };

    info!(session = id, "session started");

    let inbound = async {
        let result = inbound_loop(behavior, &mut stream, &ctx, &cancel).await;
        cancel.cancel();
        result
    };
    let outbound = async {
        let result = behavior.outbound(&mut out, &ctx, &cancel).await;
        cancel.cancel();
        result
    };
    let (inbound_result, outbound_result) = tokio::join!(inbound, outbound);

    out.flush_replies().await;
    out.close().await;

    match (&inbound_result, &outbound_result) {
        (Ok(()), Ok(())) => info!(session = id, "session closed"),
        (Err(e), _) | (_, Err(e)) => warn!(session = id, error = %e, "session ended with error"),
    }
    inbound_result.and(outbound_result)
}

async fn inbound_loop<B>(
    behavior: &B,
    stream: &mut WireStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> Result<(), StreamError>
where
    B: SessionBehavior,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = stream.next() => next,
        };

        match next {
            None | Some(Ok(WireMessage::Close)) => {
                debug!(session = ctx.id, "peer closed");
                return Ok(());
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(WireMessage::Binary(data))) => {
                debug!(session = ctx.id, len = data.len(), "ignoring binary message");
            }
            Some(Ok(WireMessage::Text(text))) => match serde_json::from_str::<B::Request>(&text) {
                Ok(request) => behavior.handle(request, ctx).await?,
                Err(e) => {
                    warn!(session = ctx.id, error = %e, "skipping malformed control message");
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientMessage, ServerMessage};
    use futures::channel::mpsc as fmpsc;
    use std::time::Duration;

    /// Answers pings and nothing else.
    struct PingOnly;

    #[async_trait]
    impl SessionBehavior for PingOnly {
        type Request = ClientMessage;

        async fn handle(
            &self,
            request: ClientMessage,
            ctx: &SessionContext,
        ) -> Result<(), StreamError> {
            if let ClientMessage::Ping { ping_action } = request {
                ctx.reply(&ServerMessage::pong(ping_action.made_at))?;
            }
            Ok(())
        }

        async fn outbound(
            &self,
            out: &mut Outbound,
            _ctx: &SessionContext,
            cancel: &CancellationToken,
        ) -> Result<(), StreamError> {
            out.pump_replies(cancel).await
        }
    }

    type Peer = (
        fmpsc::UnboundedSender<Result<WireMessage, StreamError>>,
        fmpsc::UnboundedReceiver<WireMessage>,
    );

    fn memory_transport() -> (WireSink, WireStream, Peer) {
        let (to_server, server_in) = fmpsc::unbounded();
        let (server_out, from_server) = fmpsc::unbounded();
        let sink: WireSink =
            Box::pin(server_out.sink_map_err(|_| StreamError::ChannelClosed));
        (sink, Box::pin(server_in), (to_server, from_server))
    }

    #[tokio::test]
    async fn malformed_then_ping_yields_one_pong() {
        let (sink, stream, (to_server, mut from_server)) = memory_transport();
        let shutdown = CancellationToken::new();
        let session = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { run_session(1, &PingOnly, sink, stream, &shutdown).await }
        });

        to_server
            .unbounded_send(Ok(WireMessage::Text("{\"action\":".into())))
            .unwrap();
        to_server
            .unbounded_send(Ok(WireMessage::Text(
                ClientMessage::ping(42.5).to_json().unwrap(),
            )))
            .unwrap();
        to_server.unbounded_send(Ok(WireMessage::Close)).unwrap();

        session.await.unwrap().unwrap();

        let mut pongs = Vec::new();
        while let Some(msg) = from_server.next().await {
            if let WireMessage::Text(text) = msg {
                pongs.push(ServerMessage::from_json(&text).unwrap());
            }
        }
        assert_eq!(pongs, vec![ServerMessage::pong(42.5)]);
    }

    #[tokio::test]
    async fn shutdown_cancels_both_loops() {
        let (sink, stream, (_to_server, mut from_server)) = memory_transport();
        let shutdown = CancellationToken::new();
        let session = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { run_session(2, &PingOnly, sink, stream, &shutdown).await }
        });

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(from_server.next().await, Some(WireMessage::Close));
    }

    #[tokio::test]
    async fn transport_error_ends_session() {
        let (sink, stream, (to_server, _from_server)) = memory_transport();
        let shutdown = CancellationToken::new();
        to_server
            .unbounded_send(Err(StreamError::WebSocket("reset".into())))
            .unwrap();

        let result = run_session(3, &PingOnly, sink, stream, &shutdown).await;
        assert!(matches!(result, Err(StreamError::WebSocket(_))));
    }
}
