//! The per-room coordination state.
//!
//! A `Room` is owned exclusively by its coordinator: every mutation happens
//! while the room's async mutex (the serialiser) is held, so concurrent
//! requests linearise into one total order. Members are addressed by their
//! client-asserted user id; the room holds each member's send queue as an
//! opaque connection handle and never reaches into the gateway.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{
    ChatMessage, ConnectionId, ControlAction, ErrorCode, MemberInfo, PlaybackPhase, PlaybackState,
    ServerMessage, UserId, VideoDescriptor,
};

/// A room member: wire-visible info plus the connection it is bound to.
#[derive(Debug)]
pub struct Member {
    pub info: MemberInfo,
    /// Which physical connection owns this membership. Used to ignore
    /// synthetic leaves from connections that were replaced by a re-join.
    pub connection_id: ConnectionId,
    sender: mpsc::Sender<Arc<ServerMessage>>,
}

#[derive(Debug)]
pub struct Room {
    code: String,
    members: HashMap<UserId, Member>,
    chat: VecDeque<ChatMessage>,
    chat_cap: usize,
    current_video: Option<VideoDescriptor>,
    playback: Option<PlaybackState>,
    created_at: DateTime<Utc>,
    /// Set once the last member leaves; a closed room is never re-joined.
    closed: bool,
}

impl Room {
    pub fn new(code: String, chat_cap: usize) -> Self {
        Self {
            code,
            members: HashMap::new(),
            chat: VecDeque::new(),
            chat_cap: chat_cap.max(1),
            current_video: None,
            playback: None,
            created_at: Utc::now(),
            closed: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_info(&self, user_id: &str) -> Option<&MemberInfo> {
        self.members.get(user_id).map(|m| &m.info)
    }

    pub fn member_connection(&self, user_id: &str) -> Option<ConnectionId> {
        self.members.get(user_id).map(|m| m.connection_id)
    }

    pub fn members(&self) -> Vec<MemberInfo> {
        self.members.values().map(|m| m.info.clone()).collect()
    }

    pub fn current_video(&self) -> Option<&VideoDescriptor> {
        self.current_video.as_ref()
    }

    pub fn playback(&self) -> Option<&PlaybackState> {
        self.playback.as_ref()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.playback
            .as_ref()
            .map_or(PlaybackPhase::Idle, PlaybackState::phase)
    }

    /// Admit a member, replacing any prior membership under the same user id.
    /// Returns the replaced member, whose connection is now orphaned.
    pub fn insert_member(
        &mut self,
        user_id: UserId,
        nickname: String,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
    ) -> Option<Member> {
        let member = Member {
            info: MemberInfo {
                id: user_id.clone(),
                nickname,
                connected_at: Utc::now(),
            },
            connection_id,
            sender,
        };
        self.members.insert(user_id, member)
    }

    pub fn remove_member(&mut self, user_id: &str) -> Option<Member> {
        self.members.remove(user_id)
    }

    /// Append a chat message, evicting the oldest past the cap.
    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push_back(message);
        while self.chat.len() > self.chat_cap {
            self.chat.pop_front();
        }
    }

    pub fn chat_len(&self) -> usize {
        self.chat.len()
    }

    /// The trailing `count` chat messages, oldest first.
    pub fn chat_tail(&self, count: usize) -> Vec<ChatMessage> {
        let skip = self.chat.len().saturating_sub(count);
        self.chat.iter().skip(skip).cloned().collect()
    }

    /// Set the room's current video and reset playback to paused at zero.
    /// The version continues the room's sequence so late joiners can order
    /// the load against earlier controls.
    pub fn load_video(&mut self, video: VideoDescriptor, loaded_by: &UserId) -> PlaybackState {
        let previous_version = self.playback.as_ref().map_or(0, |p| p.version);
        let state =
            PlaybackState::for_video(previous_version, video.id.clone(), loaded_by.clone());
        self.current_video = Some(video);
        self.playback = Some(state.clone());
        state
    }

    /// Apply a playback control. Accepted iff the control's video id matches
    /// the authoritative state; rejected controls change nothing.
    pub fn apply_control(
        &mut self,
        video_id: &str,
        action: ControlAction,
        current_time: f64,
        explicit_liveness: Option<bool>,
        by: &UserId,
    ) -> Result<PlaybackState, ErrorCode> {
        let Some(playback) = self.playback.as_mut() else {
            return Err(ErrorCode::VideoMismatch);
        };
        if playback.video_id != video_id {
            return Err(ErrorCode::VideoMismatch);
        }
        playback.apply_control(action, current_time, explicit_liveness, by.clone());
        Ok(playback.clone())
    }

    /// Enqueue a message to one member. Returns false when the connection's
    /// queue is gone and the membership should be reaped.
    pub fn send_to(&self, user_id: &str, message: Arc<ServerMessage>) -> bool {
        let Some(member) = self.members.get(user_id) else {
            return true;
        };
        enqueue(member, message, &self.code)
    }

    /// Fan a message out to every member. Returns the user ids whose
    /// connections are gone; the caller reaps them inside the same critical
    /// section so peers never observe a half-dead membership.
    pub fn broadcast(&self, message: &Arc<ServerMessage>) -> Vec<UserId> {
        self.broadcast_filtered(message, |_| true)
    }

    /// Fan out to every member except one (typically the originator).
    pub fn broadcast_except(&self, except: &str, message: &Arc<ServerMessage>) -> Vec<UserId> {
        self.broadcast_filtered(message, |id| id != except)
    }

    fn broadcast_filtered(
        &self,
        message: &Arc<ServerMessage>,
        keep: impl Fn(&str) -> bool,
    ) -> Vec<UserId> {
        let mut stale = Vec::new();
        for (user_id, member) in &self.members {
            if !keep(user_id) {
                continue;
            }
            if !enqueue(member, message.clone(), &self.code) {
                stale.push(user_id.clone());
            }
        }
        stale
    }
}

/// Non-blocking enqueue onto a member's send queue. The serialiser must not
/// wait on a slow consumer: a full queue drops this message, a closed queue
/// marks the membership stale.
fn enqueue(member: &Member, message: Arc<ServerMessage>, room_code: &str) -> bool {
    match member.sender.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(
                user_id = %member.info.id,
                room_code,
                "Member send queue full, dropping message"
            );
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
