//! Integration tests: full sessions over a real TCP + WebSocket loopback,
//! with the reconnecting client on one side and the streaming session
//! engine on the other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use retrocast_core::{
    ClientMessage, ClientOptions, EncodedFrame, FrameKind, FrameSink, Hub, InputEvent, Key,
    KeyEventKind, KeyState, ReconnectingClient, ServerMessage, SessionStatus, StreamChannels,
    StreamError, StreamSession, StreamSettings, WsConnector, run_session,
    transport::split_tungstenite,
};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

// ── Helpers ──────────────────────────────────────────────────────

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    url: String,
    channels: Arc<StreamChannels>,
    shutdown: CancellationToken,
    /// Dropping the current connection from the server side.
    kick: Arc<tokio::sync::Notify>,
    accepted: Arc<AtomicU64>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Accept WebSocket sessions on an ephemeral port until shut down.
async fn start_server(settings: StreamSettings) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let channels = Arc::new(StreamChannels::new(
        Hub::new(16).unwrap(),
        Hub::new(16).unwrap(),
        "zstd-xor",
        settings,
    ));
    let shutdown = CancellationToken::new();
    channels.screen.spawn_dispatch(shutdown.clone());
    channels.sound.spawn_dispatch(shutdown.clone());

    let kick = Arc::new(tokio::sync::Notify::new());
    let accepted = Arc::new(AtomicU64::new(0));

    tokio::spawn({
        let channels = Arc::clone(&channels);
        let shutdown = shutdown.clone();
        let kick = Arc::clone(&kick);
        let accepted = Arc::clone(&accepted);
        async move {
            loop {
                let (tcp, _) = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    conn = listener.accept() => conn.unwrap(),
                };
                let id = accepted.fetch_add(1, Ordering::SeqCst) + 1;
                let channels = Arc::clone(&channels);
                let shutdown = shutdown.clone();
                let kick = Arc::clone(&kick);
                tokio::spawn(async move {
                    let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                    let (sink, stream) = split_tungstenite(ws);
                    let session = StreamSession::new(channels);
                    let scope = shutdown.child_token();
                    tokio::select! {
                        _ = run_session(id, &session, sink, stream, &scope) => {}
                        _ = kick.notified() => {}
                    }
                });
            }
        }
    });

    TestServer {
        url: format!("ws://{addr}/stream"),
        channels,
        shutdown,
        kick,
        accepted,
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>);

impl FrameSink for Recorder {
    fn on_screen(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        self.0.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn on_sound(&mut self, _payload: &[u8]) -> Result<(), StreamError> {
        Ok(())
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn client_options() -> ClientOptions {
    ClientOptions {
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(200),
        refresh_interval: Duration::from_millis(100),
        rtt_window: 4,
    }
}

// ── Streaming ────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_receives_published_frames() {
    let server = start_server(StreamSettings::default()).await;
    let recorder = Recorder::default();
    let (client, mut handle) = ReconnectingClient::new(
        WsConnector::new(server.url.clone()),
        recorder.clone(),
        client_options(),
    )
    .unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(client.run(cancel.clone()));

    tokio::time::timeout(TIMEOUT, handle.status.wait_for(SessionStatus::is_connected))
        .await
        .expect("timeout")
        .unwrap();
    let channels = Arc::clone(&server.channels);
    wait_until(|| channels.screen.subscriber_count() == 1).await;

    // Latest frame wins; keep publishing until the viewer has seen one.
    let frame = EncodedFrame {
        data: Bytes::from_static(b"frame"),
        is_key_frame: true,
    };
    tokio::time::timeout(TIMEOUT, async {
        while recorder.0.lock().unwrap().is_empty() {
            channels.screen.publish(frame.clone());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no frame received");
    assert_eq!(recorder.0.lock().unwrap()[0], b"frame");

    // Key input reaches the shared state.
    handle
        .input
        .send(InputEvent::new(Key::Start, KeyEventKind::Down))
        .await
        .unwrap();
    wait_until(|| channels.keys().contains(KeyState::START)).await;

    // Codec from `init` is surfaced in the stats.
    tokio::time::timeout(TIMEOUT, handle.stats.wait_for(|s| s.codec.is_some()))
        .await
        .expect("timeout")
        .unwrap();

    cancel.cancel();
    task.await.unwrap();
    wait_until(|| channels.screen.subscriber_count() == 0).await;
}

#[tokio::test]
async fn test_malformed_message_then_ping_yields_one_pong() {
    let server = start_server(StreamSettings::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(server.url.as_str())
        .await
        .unwrap();

    ws.send(Message::Text("{\"action\":\"key\"".into()))
        .await
        .unwrap();
    ws.send(Message::Text(ClientMessage::ping(77.5).to_json().unwrap()))
        .await
        .unwrap();

    // Keep reading until the pong shows up, then a little longer to make
    // sure no second one follows.
    let mut control = Vec::new();
    loop {
        let seen_pong = control
            .iter()
            .any(|m| matches!(m, ServerMessage::Pong { .. }));
        let wait = if seen_pong {
            Duration::from_millis(200)
        } else {
            TIMEOUT
        };
        match tokio::time::timeout(wait, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                control.push(ServerMessage::from_json(&text).unwrap());
            }
            Ok(Some(Ok(_))) => {}
            _ => break,
        }
    }
    let pongs: Vec<_> = control
        .iter()
        .filter(|m| matches!(m, ServerMessage::Pong { .. }))
        .collect();
    assert_eq!(pongs, vec![&ServerMessage::pong(77.5)]);
    assert_eq!(control[0], ServerMessage::init("zstd-xor"));
}

#[tokio::test]
async fn test_announcement_precedes_each_kind_change() {
    let server = start_server(StreamSettings {
        flow_control: false,
        ..StreamSettings::default()
    })
    .await;
    let (mut ws, _) = tokio_tungstenite::connect_async(server.url.as_str())
        .await
        .unwrap();

    let Some(Ok(Message::Text(init))) = ws.next().await else {
        panic!("expected init");
    };
    assert_eq!(
        ServerMessage::from_json(&init).unwrap(),
        ServerMessage::init("zstd-xor")
    );
    let channels = Arc::clone(&server.channels);
    wait_until(|| channels.sound.subscriber_count() == 1).await;

    channels.sound.publish(EncodedFrame {
        data: Bytes::from_static(&[1, 0]),
        is_key_frame: true,
    });
    let Some(Ok(Message::Text(announce))) = ws.next().await else {
        panic!("expected announcement");
    };
    assert_eq!(
        ServerMessage::from_json(&announce).unwrap(),
        ServerMessage::frame(FrameKind::Sound)
    );
    let Some(Ok(Message::Binary(payload))) = ws.next().await else {
        panic!("expected payload");
    };
    assert_eq!(payload, vec![1, 0]);
}

// ── Reconnection ─────────────────────────────────────────────────

#[tokio::test]
async fn test_client_reconnects_after_server_drop() {
    let server = start_server(StreamSettings::default()).await;
    let (client, mut handle) = ReconnectingClient::new(
        WsConnector::new(server.url.clone()),
        Recorder::default(),
        client_options(),
    )
    .unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(client.run(cancel.clone()));

    tokio::time::timeout(TIMEOUT, handle.status.wait_for(SessionStatus::is_connected))
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(server.accepted.load(Ordering::SeqCst), 1);

    server.kick.notify_one();
    tokio::time::timeout(
        TIMEOUT,
        handle.status.wait_for(|s| *s == SessionStatus::Disconnected),
    )
    .await
    .expect("timeout")
    .unwrap();
    tokio::time::timeout(TIMEOUT, handle.status.wait_for(SessionStatus::is_connected))
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(server.accepted.load(Ordering::SeqCst), 2);

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(*handle.status.borrow(), SessionStatus::Shutdown);
}

#[tokio::test]
async fn test_client_retries_until_server_appears() {
    // Reserve a port, then release it so the first attempts are refused.
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (client, mut handle) = ReconnectingClient::new(
        WsConnector::new(format!("ws://{addr}/stream")),
        Recorder::default(),
        client_options(),
    )
    .unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(client.run(cancel.clone()));

    tokio::time::timeout(
        TIMEOUT,
        handle.status.wait_for(|s| *s == SessionStatus::Disconnected),
    )
    .await
    .expect("timeout")
    .unwrap();

    let listener = TcpListener::bind(addr).await.unwrap();
    let (tcp, _) = tokio::time::timeout(TIMEOUT, listener.accept())
        .await
        .expect("client never retried")
        .unwrap();
    let _ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    tokio::time::timeout(TIMEOUT, handle.status.wait_for(SessionStatus::is_connected))
        .await
        .expect("timeout")
        .unwrap();

    cancel.cancel();
    task.await.unwrap();
}
