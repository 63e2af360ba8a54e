//! A WebSocket client session that keeps a local player in lock-step with
//! its room.
//!
//! The session owns the transport and the [`SyncEngine`]; the embedding
//! application supplies a [`PlayerSurface`] for its actual player. Sync
//! frames (`video-control`) are handled internally; everything user-facing
//! surfaces as a [`SessionEvent`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Instant;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol::{
    ChatMessage, ClientMessage, ControlAction, ErrorCode, MemberInfo, PlaybackState,
    RoomStatePayload, ServerMessage, UserId, VideoDescriptor,
};

use super::sync_engine::{Observation, SyncEngine};

/// The seam to the embedding application's actual video player.
#[async_trait]
pub trait PlayerSurface: Send {
    /// Load a new video source into the player.
    async fn load_video(&mut self, video: &VideoDescriptor);
    /// Install an authoritative state. `hard_seek` is set when local drift
    /// exceeded the correction threshold.
    async fn apply_state(&mut self, state: &PlaybackState, hard_seek: bool);
    /// Current local playhead in seconds.
    fn position(&self) -> f64;
    /// Whether the local player is currently playing.
    fn is_playing(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/ws`
    pub url: String,
    pub room_code: String,
    pub user_id: UserId,
    pub nickname: String,
}

/// User-facing happenings in the room.
#[derive(Debug)]
pub enum SessionEvent {
    /// Initial room snapshot after joining
    Snapshot(Box<RoomStatePayload>),
    Chat(ChatMessage),
    MemberJoined {
        user: MemberInfo,
        user_count: usize,
    },
    MemberLeft {
        user_id: UserId,
        user_count: usize,
    },
    MemberCount(usize),
    /// The room switched to a different video
    VideoChanged(VideoDescriptor),
    Ack {
        ok: bool,
        version: Option<u64>,
        reason: Option<ErrorCode>,
    },
    /// Server closed the connection
    Closed,
}

pub struct SyncSession<P: PlayerSurface> {
    config: SessionConfig,
    engine: SyncEngine,
    player: P,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl<P: PlayerSurface> SyncSession<P> {
    /// Connect and join the configured room. The first event returned by
    /// [`next_event`](Self::next_event) is normally the room snapshot.
    pub async fn connect(config: SessionConfig, player: P) -> anyhow::Result<Self> {
        let (socket, _response) = connect_async(config.url.as_str()).await?;
        let mut session = Self {
            engine: SyncEngine::new(),
            player,
            socket,
            config,
        };
        let join = ClientMessage::JoinRoom {
            room_code: session.config.room_code.clone(),
            user_id: session.config.user_id.clone(),
            nickname: session.config.nickname.clone(),
        };
        session.send(&join).await?;
        Ok(session)
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Read frames until the next user-facing event; sync frames are applied
    /// to the player along the way.
    pub async fn next_event(&mut self) -> anyhow::Result<SessionEvent> {
        loop {
            let Some(frame) = self.socket.next().await else {
                return Ok(SessionEvent::Closed);
            };
            let text = match frame? {
                Message::Text(text) => text,
                Message::Ping(payload) => {
                    self.socket.send(Message::Pong(payload)).await?;
                    continue;
                }
                Message::Close(_) => return Ok(SessionEvent::Closed),
                _ => continue,
            };

            let message: ServerMessage = match serde_json::from_str(text.as_str()) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, "Dropped malformed server frame");
                    continue;
                }
            };

            match message {
                ServerMessage::RoomState(payload) => {
                    if let Some(video) = &payload.current_video {
                        self.player.load_video(video).await;
                        if let Some(pending) = self.engine.video_ready(video.id.clone()) {
                            self.observe_and_apply(pending).await;
                        }
                    }
                    if let Some(state) = payload.playback.clone() {
                        self.observe_and_apply(state).await;
                    }
                    return Ok(SessionEvent::Snapshot(payload));
                }
                ServerMessage::UserJoined { user, user_count } => {
                    return Ok(SessionEvent::MemberJoined { user, user_count });
                }
                ServerMessage::UserLeft { user_id, user_count } => {
                    return Ok(SessionEvent::MemberLeft { user_id, user_count });
                }
                ServerMessage::UserCountUpdate { count } => {
                    return Ok(SessionEvent::MemberCount(count));
                }
                ServerMessage::ChatMessage(message) => {
                    return Ok(SessionEvent::Chat(message));
                }
                ServerMessage::VideoLoaded { video, state, .. } => {
                    self.player.load_video(&video).await;
                    let _ = self.engine.video_ready(video.id.clone());
                    self.observe_and_apply(state).await;
                    return Ok(SessionEvent::VideoChanged(video));
                }
                // Pure sync traffic; handled silently
                ServerMessage::VideoControl { state } => {
                    self.observe_and_apply(state).await;
                }
                ServerMessage::Ack {
                    ok,
                    version,
                    reason,
                } => {
                    return Ok(SessionEvent::Ack {
                        ok,
                        version,
                        reason,
                    });
                }
            }
        }
    }

    /// Emit a local play intent at the player's current position.
    pub async fn emit_play(&mut self) -> anyhow::Result<()> {
        self.emit(ControlAction::Play).await
    }

    /// Emit a local pause intent at the player's current position.
    pub async fn emit_pause(&mut self) -> anyhow::Result<()> {
        self.emit(ControlAction::Pause).await
    }

    /// Emit a local seek intent; the player has already moved its playhead.
    pub async fn emit_seek(&mut self) -> anyhow::Result<()> {
        self.emit(ControlAction::Seek).await
    }

    /// Post a chat line.
    pub async fn send_chat(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        let message = ClientMessage::ChatMessage {
            room_code: self.config.room_code.clone(),
            user_id: self.config.user_id.clone(),
            nickname: self.config.nickname.clone(),
            text: text.into(),
        };
        self.send(&message).await
    }

    /// Declare a freshly uploaded video as the room's current video and load
    /// it into the local player.
    pub async fn announce_video(&mut self, video: VideoDescriptor) -> anyhow::Result<()> {
        self.player.load_video(&video).await;
        if let Some(pending) = self.engine.video_ready(video.id.clone()) {
            self.observe_and_apply(pending).await;
        }
        let message = ClientMessage::VideoLoaded {
            room_code: self.config.room_code.clone(),
            user_id: self.config.user_id.clone(),
            video,
        };
        self.send(&message).await
    }

    /// The local player finished buffering `video_id`; drain any pending
    /// authoritative state for it.
    pub async fn video_ready(&mut self, video_id: &str) {
        if let Some(pending) = self.engine.video_ready(video_id.to_string()) {
            self.observe_and_apply(pending).await;
        }
    }

    /// Leave the room and close the connection.
    pub async fn leave(mut self) -> anyhow::Result<()> {
        let message = ClientMessage::LeaveRoom {
            room_code: self.config.room_code.clone(),
            user_id: self.config.user_id.clone(),
        };
        self.send(&message).await?;
        self.socket.close(None).await?;
        Ok(())
    }

    async fn emit(&mut self, action: ControlAction) -> anyhow::Result<()> {
        let Some(video_id) = self.engine.loaded_video().map(str::to_string) else {
            return Ok(());
        };
        let position = self.player.position();
        let playing = self.player.is_playing();
        let Some(intent) = self
            .engine
            .local_intent(action, position, playing, Instant::now())
        else {
            return Ok(());
        };

        let message = ClientMessage::VideoControl {
            room_code: self.config.room_code.clone(),
            user_id: self.config.user_id.clone(),
            video_id,
            action: intent.action,
            current_time: intent.current_time,
            is_playing: intent.is_playing,
            client_sent_at: Some(chrono::Utc::now().timestamp_millis() as f64),
        };
        self.send(&message).await
    }

    async fn observe_and_apply(&mut self, state: PlaybackState) {
        let position = self.player.position();
        match self.engine.observe(state, position, Instant::now()) {
            Observation::Apply { state, hard_seek } => {
                self.player.apply_state(&state, hard_seek).await;
                self.engine.finish_apply(Instant::now());
            }
            Observation::Deferred | Observation::Stale => {}
        }
    }

    async fn send(&mut self, message: &ClientMessage) -> anyhow::Result<()> {
        let json = serde_json::to_string(message)?;
        self.socket.send(Message::Text(json.into())).await?;
        Ok(())
    }
}
