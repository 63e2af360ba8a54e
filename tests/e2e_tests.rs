//! End-to-end tests: a real axum server on a loopback port, driven by the
//! library's own client session over WebSocket.


use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use watchsync_server::client::{PlayerSurface, SessionConfig, SessionEvent, SyncSession};
use watchsync_server::protocol::{generate_room_code, PlaybackState, VideoDescriptor};
use watchsync_server::server::SyncServer;
use watchsync_server::websocket::create_router;

struct FakePlayer {
    position: f64,
    playing: bool,
    loaded: Option<String>,
    hard_seeks: u32,
}

impl FakePlayer {
    fn new() -> Self {
        Self {
            position: 0.0,
            playing: false,
            loaded: None,
            hard_seeks: 0,
        }
    }
}

#[async_trait]
impl PlayerSurface for FakePlayer {
    async fn load_video(&mut self, video: &VideoDescriptor) {
        self.loaded = Some(video.id.clone());
        self.position = 0.0;
        self.playing = false;
    }

    async fn apply_state(&mut self, state: &PlaybackState, hard_seek: bool) {
        if hard_seek {
            self.hard_seeks += 1;
        }
        self.position = state.current_time;
        self.playing = state.is_playing;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

async fn spawn_server() -> (SocketAddr, Arc<SyncServer>) {
    let server = test_helpers::create_test_server().await;
    let app = create_router("*").with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    (addr, server)
}

fn session_config(
    addr: SocketAddr,
    room_code: &str,
    user_id: &str,
    nickname: &str,
) -> SessionConfig {
    SessionConfig {
        url: format!("ws://{addr}/ws"),
        room_code: room_code.to_string(),
        user_id: user_id.to_string(),
        nickname: nickname.to_string(),
    }
}

fn sample_video() -> VideoDescriptor {
    VideoDescriptor {
        id: "vid-e2e".to_string(),
        name: "feature.mp4".to_string(),
        size: 1_000_000,
        mime_type: "video/mp4".to_string(),
        storage_key: "vid-e2e".to_string(),
    }
}

async fn pump_until<F>(session: &mut SyncSession<FakePlayer>, mut predicate: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = session.next_event().await.expect("session error");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

/// Two viewers converge through play and pause, versions agreeing on both
/// sides, with a hard seek correcting the second viewer's initial drift.
#[tokio::test]
async fn test_two_viewers_converge_over_websocket() {
    let (addr, _server) = spawn_server().await;
    let room_code = generate_room_code();

    let mut session_a = SyncSession::connect(
        session_config(addr, &room_code, "user-a", "Alice"),
        FakePlayer::new(),
    )
    .await
    .expect("Alice should connect");
    pump_until(&mut session_a, |e| matches!(e, SessionEvent::Snapshot(_))).await;

    let mut session_b = SyncSession::connect(session_config(addr, &room_code, "user-b", "Bob"), FakePlayer::new())
        .await
        .expect("Bob should connect");
    pump_until(&mut session_b, |e| matches!(e, SessionEvent::Snapshot(_))).await;
    pump_until(&mut session_a, |e| {
        matches!(e, SessionEvent::MemberJoined { user, .. } if user.id == "user-b")
    })
    .await;

    // Alice declares the video; Bob's player loads it off the broadcast
    session_a
        .announce_video(sample_video())
        .await
        .expect("announce should send");
    pump_until(&mut session_b, |e| {
        matches!(e, SessionEvent::VideoChanged(video) if video.id == "vid-e2e")
    })
    .await;
    assert_eq!(session_b.player().loaded.as_deref(), Some("vid-e2e"));
    assert!(!session_b.player().playing);

    // Alice plays from 12.0; a chat line flushes Bob's event pump
    session_a.player_mut().position = 12.0;
    session_a.emit_play().await.expect("play should send");
    session_a.send_chat("sync-1").await.expect("chat should send");
    pump_until(&mut session_b, |e| {
        matches!(e, SessionEvent::Chat(chat) if chat.text == "sync-1")
    })
    .await;

    assert!(session_b.player().playing);
    assert_eq!(session_b.player().position, 12.0);
    // Bob sat at 0.0 while the room was at 12.0: that demanded a hard seek
    assert!(session_b.player().hard_seeks >= 1);

    // Let Bob's apply quiescence window pass before he emits his own intent
    tokio::time::sleep(Duration::from_millis(200)).await;

    session_b.player_mut().position = 12.3;
    session_b.emit_pause().await.expect("pause should send");
    session_b.send_chat("sync-2").await.expect("chat should send");
    pump_until(&mut session_a, |e| {
        matches!(e, SessionEvent::Chat(chat) if chat.text == "sync-2")
    })
    .await;
    // Bob's own pause control loops back to him too (originator included);
    // drain it so his local player picks up the authoritative state.
    pump_until(&mut session_b, |e| matches!(e, SessionEvent::Ack { .. })).await;

    // Quiescent now: both sides hold the same (video, time, liveness, version)
    assert!(!session_a.player().playing);
    assert_eq!(session_a.player().position, 12.3);
    assert!(!session_b.player().playing);
    assert_eq!(
        session_a.engine().observed_version(),
        session_b.engine().observed_version()
    );
    // load=1, play=2, pause=3
    assert_eq!(session_a.engine().observed_version(), 3);
}

/// The ack for an accepted control carries the assigned version.
#[tokio::test]
async fn test_control_ack_carries_version() {
    let (addr, _server) = spawn_server().await;
    let room_code = generate_room_code();

    let mut session = SyncSession::connect(
        session_config(addr, &room_code, "user-a", "Alice"),
        FakePlayer::new(),
    )
    .await
    .expect("should connect");
    pump_until(&mut session, |e| matches!(e, SessionEvent::Snapshot(_))).await;

    session
        .announce_video(sample_video())
        .await
        .expect("announce should send");
    match pump_until(&mut session, |e| matches!(e, SessionEvent::Ack { .. })).await {
        SessionEvent::Ack { ok, version, .. } => {
            assert!(ok);
            assert_eq!(version, Some(1));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    session.emit_play().await.expect("play should send");
    match pump_until(&mut session, |e| matches!(e, SessionEvent::Ack { .. })).await {
        SessionEvent::Ack { ok, version, .. } => {
            assert!(ok);
            assert_eq!(version, Some(2));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Leaving tears the membership down; the peer sees it and the room reaps
/// once empty.
#[tokio::test]
async fn test_leave_notifies_peer_and_reaps_room() {
    let (addr, server) = spawn_server().await;
    let room_code = generate_room_code();

    let mut session_a = SyncSession::connect(
        session_config(addr, &room_code, "user-a", "Alice"),
        FakePlayer::new(),
    )
    .await
    .expect("Alice should connect");
    pump_until(&mut session_a, |e| matches!(e, SessionEvent::Snapshot(_))).await;

    let session_b = SyncSession::connect(session_config(addr, &room_code, "user-b", "Bob"), FakePlayer::new())
        .await
        .expect("Bob should connect");
    pump_until(&mut session_a, |e| {
        matches!(e, SessionEvent::MemberJoined { user, .. } if user.id == "user-b")
    })
    .await;

    session_b.leave().await.expect("leave should send");
    pump_until(&mut session_a, |e| {
        matches!(e, SessionEvent::MemberLeft { user_id, user_count: 1 } if user_id == "user-b")
    })
    .await;

    drop(session_a);
    // The server notices the closed transport and reaps the empty room
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if server.room_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("room should be reaped after the last member disconnects");
}
