
use test_helpers::{connect, create_test_server, create_test_server_with_config, drain, join};
use watchsync_server::protocol::*;

fn video(id: &str, name: &str) -> VideoDescriptor {
    VideoDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        size: 1_000_000,
        mime_type: "video/mp4".to_string(),
        storage_key: id.to_string(),
    }
}

fn control(
    room: &str,
    user: &str,
    video_id: &str,
    action: ControlAction,
    time: f64,
    playing: Option<bool>,
) -> ClientMessage {
    ClientMessage::VideoControl {
        room_code: room.to_string(),
        user_id: user.to_string(),
        video_id: video_id.to_string(),
        action,
        current_time: time,
        is_playing: playing,
        client_sent_at: None,
    }
}

/// Joining sends the snapshot to the joiner first, then membership events to
/// the peers only.
#[tokio::test]
async fn test_join_flow_snapshot_then_peer_notifications() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);

    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;

    let msg = rx_a.try_recv().unwrap();
    match msg.as_ref() {
        ServerMessage::RoomState(payload) => {
            assert_eq!(payload.users.len(), 1);
            assert_eq!(payload.users[0].id, "user-a");
            assert!(payload.current_video.is_none());
            assert!(payload.playback.is_none());
        }
        other => panic!("Expected room-state for the joiner, got {other:?}"),
    }
    // The join announcement lands after the snapshot
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::ChatMessage(chat) => {
            assert!(chat.system);
            assert!(chat.text.contains("Alice"));
        }
        other => panic!("Expected system chat announcement, got {other:?}"),
    }

    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;

    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::RoomState(payload) => {
            assert_eq!(payload.users.len(), 2);
            // The snapshot carries the trailing chat, including Alice's join
            assert!(payload.messages.iter().any(|m| m.text.contains("Alice")));
        }
        other => panic!("Expected room-state for the second joiner, got {other:?}"),
    }

    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::UserJoined { user, user_count } => {
            assert_eq!(user.id, "user-b");
            assert_eq!(user.nickname, "Bob");
            assert_eq!(*user_count, 2);
        }
        other => panic!("Expected user-joined for the peer, got {other:?}"),
    }
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::UserCountUpdate { count } => assert_eq!(*count, 2),
        other => panic!("Expected user-count-update, got {other:?}"),
    }
}

/// Chat fans out to every member including the sender.
#[tokio::test]
async fn test_chat_reaches_sender_and_peers() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .handle_client_message(
            &conn_a,
            ClientMessage::ChatMessage {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                nickname: "Alice".to_string(),
                text: "<b>hello</b>".to_string(),
            },
        )
        .await;

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.try_recv().unwrap().as_ref() {
            ServerMessage::ChatMessage(chat) => {
                assert_eq!(chat.user_id, "user-a");
                assert_eq!(chat.nickname, "Alice");
                // Text travels untouched; rendering clients escape it
                assert_eq!(chat.text, "<b>hello</b>");
                assert!(!chat.system);
            }
            other => panic!("Expected chat-message, got {other:?}"),
        }
    }
}

/// The chat buffer is bounded and a joiner receives only the trailing slice.
#[tokio::test]
async fn test_chat_history_is_bounded() {
    let mut config = test_helpers::test_config();
    config.server.chat_history_cap = 5;
    config.server.room_state_chat_slice = 5;
    let server = create_test_server_with_config(config).await;

    let (conn_a, mut rx_a) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    drain(&mut rx_a);

    for i in 0..8 {
        server
            .handle_client_message(
                &conn_a,
                ClientMessage::ChatMessage {
                    room_code: "MOVIES".to_string(),
                    user_id: "user-a".to_string(),
                    nickname: "Alice".to_string(),
                    text: format!("message {i}"),
                },
            )
            .await;
    }

    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;

    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::RoomState(payload) => {
            assert_eq!(payload.messages.len(), 5);
            // Oldest entries were evicted; the tail ends with the newest
            assert_eq!(payload.messages.last().unwrap().text, "message 7");
            assert_eq!(payload.messages.first().unwrap().text, "message 3");
        }
        other => panic!("Expected room-state, got {other:?}"),
    }
}

/// Loading a video resets playback, acks the sender, and notifies peers.
#[tokio::test]
async fn test_video_load_resets_playback() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .handle_client_message(
            &conn_a,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                video: video("vid-x", "movie.mp4"),
            },
        )
        .await;

    // Peer gets the descriptor plus the reset state
    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::VideoLoaded { video, state, user } => {
            assert_eq!(video.id, "vid-x");
            assert_eq!(user.id, "user-a");
            assert_eq!(state.version, 1);
            assert_eq!(state.current_time, 0.0);
            assert!(!state.is_playing);
            assert_eq!(state.video_id, "vid-x");
        }
        other => panic!("Expected video-loaded broadcast, got {other:?}"),
    }

    // Sender gets the announcement chat and a positive ack with the version
    let messages = drain(&mut rx_a);
    assert!(messages.iter().any(|m| matches!(
        m.as_ref(),
        ServerMessage::Ack { ok: true, version: Some(1), .. }
    )));
    assert!(!messages
        .iter()
        .any(|m| matches!(m.as_ref(), ServerMessage::VideoLoaded { .. })));
}

/// Scenario: pause propagation. A accepted control bumps the version, is
/// broadcast to everyone including the originator, and acks the originator.
#[tokio::test]
async fn test_pause_propagates_with_version() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;

    server
        .handle_client_message(
            &conn_a,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                video: video("vid-x", "movie.mp4"),
            },
        )
        .await;
    server
        .handle_client_message(
            &conn_b,
            control("MOVIES", "user-b", "vid-x", ControlAction::Play, 12.0, Some(true)),
        )
        .await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .handle_client_message(
            &conn_a,
            control("MOVIES", "user-a", "vid-x", ControlAction::Pause, 12.3, Some(false)),
        )
        .await;

    // Both members, originator included, see the new state
    for rx in [&mut rx_a, &mut rx_b] {
        match rx.try_recv().unwrap().as_ref() {
            ServerMessage::VideoControl { state } => {
                assert_eq!(state.version, 3);
                assert_eq!(state.current_time, 12.3);
                assert!(!state.is_playing);
                assert_eq!(state.last_updated_by, "user-a");
            }
            other => panic!("Expected video-control broadcast, got {other:?}"),
        }
    }

    // The originator's ack carries the assigned version
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::Ack {
            ok: true,
            version: Some(3),
            ..
        } => {}
        other => panic!("Expected ack with version 3, got {other:?}"),
    }
}

/// Scenario: seek during play keeps playing; seek while paused stays paused.
#[tokio::test]
async fn test_seek_inherits_liveness() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;

    server
        .handle_client_message(
            &conn_a,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                video: video("vid-x", "movie.mp4"),
            },
        )
        .await;
    server
        .handle_client_message(
            &conn_a,
            control("MOVIES", "user-a", "vid-x", ControlAction::Play, 30.0, Some(true)),
        )
        .await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Seek without explicit liveness
    server
        .handle_client_message(
            &conn_b,
            control("MOVIES", "user-b", "vid-x", ControlAction::Seek, 90.0, None),
        )
        .await;

    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::VideoControl { state } => {
            assert_eq!(state.version, 3);
            assert_eq!(state.current_time, 90.0);
            assert!(state.is_playing, "seek during play must stay playing");
            assert_eq!(state.last_updated_by, "user-b");
        }
        other => panic!("Expected video-control broadcast, got {other:?}"),
    }

    server
        .handle_client_message(
            &conn_a,
            control("MOVIES", "user-a", "vid-x", ControlAction::Pause, 90.0, Some(false)),
        )
        .await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .handle_client_message(
            &conn_b,
            control("MOVIES", "user-b", "vid-x", ControlAction::Seek, 10.0, None),
        )
        .await;
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::VideoControl { state } => {
            assert!(!state.is_playing, "seek while paused must stay paused");
            assert_eq!(state.current_time, 10.0);
        }
        other => panic!("Expected video-control broadcast, got {other:?}"),
    }
}

/// Scenario: loading a new video invalidates controls against the old one.
#[tokio::test]
async fn test_control_for_replaced_video_is_rejected() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;

    for (id, name) in [("vid-x", "first.mp4"), ("vid-y", "second.mp4")] {
        server
            .handle_client_message(
                &conn_a,
                ClientMessage::VideoLoaded {
                    room_code: "MOVIES".to_string(),
                    user_id: "user-a".to_string(),
                    video: video(id, name),
                },
            )
            .await;
    }
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Control still referencing the replaced video
    server
        .handle_client_message(
            &conn_b,
            control("MOVIES", "user-b", "vid-x", ControlAction::Play, 5.0, Some(true)),
        )
        .await;

    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::Ack {
            ok: false,
            reason: Some(ErrorCode::VideoMismatch),
            ..
        } => {}
        other => panic!("Expected video-mismatch nack, got {other:?}"),
    }
    // No broadcast happened and no version was consumed
    assert!(drain(&mut rx_a).is_empty());

    server
        .handle_client_message(
            &conn_b,
            control("MOVIES", "user-b", "vid-y", ControlAction::Play, 0.0, Some(true)),
        )
        .await;
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::VideoControl { state } => {
            // Load, load, play: the rejected control left no gap
            assert_eq!(state.version, 3);
        }
        other => panic!("Expected video-control broadcast, got {other:?}"),
    }
}

/// Two identical pauses produce two versions describing the same state.
#[tokio::test]
async fn test_idempotent_pause_produces_two_versions() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    server
        .handle_client_message(
            &conn_a,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                video: video("vid-x", "movie.mp4"),
            },
        )
        .await;
    drain(&mut rx_a);

    for _ in 0..2 {
        server
            .handle_client_message(
                &conn_a,
                control("MOVIES", "user-a", "vid-x", ControlAction::Pause, 42.0, Some(false)),
            )
            .await;
    }

    let versions: Vec<u64> = drain(&mut rx_a)
        .iter()
        .filter_map(|m| match m.as_ref() {
            ServerMessage::VideoControl { state } => {
                assert_eq!(state.current_time, 42.0);
                assert!(!state.is_playing);
                Some(state.version)
            }
            _ => None,
        })
        .collect();
    assert_eq!(versions, vec![2, 3]);
}

/// Re-joining with an existing user id replaces the handle without peer
/// churn, and the orphaned connection cannot remove the new membership.
#[tokio::test]
async fn test_rejoin_replaces_prior_handle() {
    let server = create_test_server().await;
    let (conn_old, mut rx_old) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_old, "MOVIES", "alice", "Alice").await;
    join(&server, &conn_b, "MOVIES", "bob", "Bob").await;
    drain(&mut rx_old);
    drain(&mut rx_b);

    // Same user id, fresh connection
    let (conn_new, mut rx_new) = connect(&server);
    join(&server, &conn_new, "MOVIES", "alice", "Alice").await;

    match rx_new.try_recv().unwrap().as_ref() {
        ServerMessage::RoomState(payload) => assert_eq!(payload.users.len(), 2),
        other => panic!("Expected room-state for the replacement join, got {other:?}"),
    }
    // Peers see no membership churn for the replacement
    assert!(drain(&mut rx_b).is_empty());

    // A leave from the orphaned connection is ignored
    server
        .handle_client_message(
            &conn_old,
            ClientMessage::LeaveRoom {
                room_code: "MOVIES".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;
    assert!(drain(&mut rx_b).is_empty());

    let info = server.room_info("MOVIES").await.expect("room should exist");
    assert_eq!(info.user_count, 2);
}

/// A connection holds at most one membership; joining a second room leaves
/// the first.
#[tokio::test]
async fn test_connection_is_moved_between_rooms() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);

    join(&server, &conn_a, "FIRST1", "user-a", "Alice").await;
    assert!(server.room_info("FIRST1").await.is_some());

    join(&server, &conn_a, "SECOND", "user-a", "Alice").await;
    drain(&mut rx_a);

    // The first room emptied and was reaped
    assert!(server.room_info("FIRST1").await.is_none());
    let info = server.room_info("SECOND").await.expect("room should exist");
    assert_eq!(info.user_count, 1);
}

/// Scenario: last-leaver reap. A rejoin after the room died starts from
/// scratch: empty chat, no playback, version sequence restarting at 1.
#[tokio::test]
async fn test_room_is_destroyed_eagerly_and_recreated_fresh() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    server
        .handle_client_message(
            &conn_a,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
                video: video("vid-x", "movie.mp4"),
            },
        )
        .await;
    server
        .handle_client_message(
            &conn_a,
            control("MOVIES", "user-a", "vid-x", ControlAction::Play, 10.0, Some(true)),
        )
        .await;

    server
        .handle_client_message(
            &conn_a,
            ClientMessage::LeaveRoom {
                room_code: "MOVIES".to_string(),
                user_id: "user-a".to_string(),
            },
        )
        .await;

    assert!(server.room_info("MOVIES").await.is_none());
    assert_eq!(server.room_count(), 0);
    drain(&mut rx_a);

    // Immediate rejoin lands in a fresh room
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;
    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::RoomState(payload) => {
            assert!(payload.playback.is_none());
            assert!(payload.current_video.is_none());
            // Only Bob's own join announcement may follow; the snapshot is clean
            assert!(payload.messages.is_empty());
        }
        other => panic!("Expected a fresh room-state, got {other:?}"),
    }
    drain(&mut rx_b);

    server
        .handle_client_message(
            &conn_b,
            ClientMessage::VideoLoaded {
                room_code: "MOVIES".to_string(),
                user_id: "user-b".to_string(),
                video: video("vid-y", "other.mp4"),
            },
        )
        .await;
    let messages = drain(&mut rx_b);
    assert!(
        messages.iter().any(|m| matches!(
            m.as_ref(),
            ServerMessage::Ack { ok: true, version: Some(1), .. }
        )),
        "version sequence must restart at 1 in a fresh room"
    );
}

/// A transport disconnect runs the ordinary leave path.
#[tokio::test]
async fn test_disconnect_enqueues_synthetic_leave() {
    let server = create_test_server().await;
    let (conn_a, _rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);
    join(&server, &conn_a, "MOVIES", "user-a", "Alice").await;
    join(&server, &conn_b, "MOVIES", "user-b", "Bob").await;
    drain(&mut rx_b);

    server.unregister_client(&conn_a).await;

    let messages = drain(&mut rx_b);
    assert!(messages.iter().any(|m| matches!(
        m.as_ref(),
        ServerMessage::UserLeft { user_id, user_count: 1 } if user_id == "user-a"
    )));
    assert!(messages
        .iter()
        .any(|m| matches!(m.as_ref(), ServerMessage::UserCountUpdate { count: 1 })));

    let info = server.room_info("MOVIES").await.expect("room should exist");
    assert_eq!(info.user_count, 1);
}

/// Malformed requests are answered with a bad-request nack, not a crash.
#[tokio::test]
async fn test_invalid_join_is_nacked() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);

    // Wrong code length
    join(&server, &conn_a, "AB", "user-a", "Alice").await;
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::Ack {
            ok: false,
            reason: Some(ErrorCode::BadRequest),
            ..
        } => {}
        other => panic!("Expected bad-request nack, got {other:?}"),
    }

    // Nickname too long
    join(&server, &conn_a, "MOVIES", "user-a", "an-unreasonably-long-nickname").await;
    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::Ack { ok: false, .. } => {}
        other => panic!("Expected bad-request nack, got {other:?}"),
    }

    assert_eq!(server.room_count(), 0);
}

/// Controls against an unknown room are answered with not-found.
#[tokio::test]
async fn test_control_for_unknown_room_is_nacked() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);

    server
        .handle_client_message(
            &conn_a,
            control("GHOST1", "user-a", "vid-x", ControlAction::Play, 0.0, Some(true)),
        )
        .await;

    match rx_a.try_recv().unwrap().as_ref() {
        ServerMessage::Ack {
            ok: false,
            reason: Some(ErrorCode::NotFound),
            ..
        } => {}
        other => panic!("Expected not-found nack, got {other:?}"),
    }
}

/// Room codes are case-folded on entry.
#[tokio::test]
async fn test_room_codes_are_case_folded() {
    let server = create_test_server().await;
    let (conn_a, mut rx_a) = connect(&server);
    let (conn_b, mut rx_b) = connect(&server);

    join(&server, &conn_a, "movies", "user-a", "Alice").await;
    join(&server, &conn_b, "MoViEs", "user-b", "Bob").await;
    drain(&mut rx_a);

    match rx_b.try_recv().unwrap().as_ref() {
        ServerMessage::RoomState(payload) => assert_eq!(payload.users.len(), 2),
        other => panic!("Expected both joins to land in one room, got {other:?}"),
    }
    assert!(server.room_info("MOVIES").await.is_some());
    assert_eq!(server.room_count(), 1);
}
