use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::playback::{ControlAction, PlaybackState};
use super::types::{ChatMessage, MemberInfo, UserId, VideoDescriptor};

/// Message kinds sent from client to server.
///
/// One JSON object per WebSocket text frame, adjacently tagged:
/// `{"type": "join-room", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join a room, creating it if absent. Idempotent: a join with a
    /// `user_id` already present replaces the prior membership and orphans
    /// its connection.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        user_id: UserId,
        nickname: String,
    },
    /// Leave a room; a no-op if the membership is gone already
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_code: String, user_id: UserId },
    /// Post a chat line. Text is untrusted and forwarded untouched.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        room_code: String,
        user_id: UserId,
        nickname: String,
        text: String,
    },
    /// Declare the room's current video
    #[serde(rename_all = "camelCase")]
    VideoLoaded {
        room_code: String,
        user_id: UserId,
        video: VideoDescriptor,
    },
    /// Request a playback state transition
    #[serde(rename_all = "camelCase")]
    VideoControl {
        room_code: String,
        user_id: UserId,
        video_id: String,
        action: ControlAction,
        current_time: f64,
        /// Required by the protocol for play/pause; optional for seek,
        /// where liveness is inherited from the authoritative state
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_playing: Option<bool>,
        /// Client wall-clock milliseconds, carried for diagnostics only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_sent_at: Option<f64>,
    },
}

/// Snapshot sent once to a joining connection.
/// Boxed in `ServerMessage` to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatePayload {
    pub users: Vec<MemberInfo>,
    /// The most recent slice of the chat buffer (oldest first)
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_video: Option<VideoDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackState>,
}

/// Message kinds sent from server to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once to a joining connection (boxed to reduce enum size)
    RoomState(Box<RoomStatePayload>),
    /// Another member joined the room
    #[serde(rename_all = "camelCase")]
    UserJoined { user: MemberInfo, user_count: usize },
    /// A member left the room
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: UserId, user_count: usize },
    /// Membership count changed
    #[serde(rename_all = "camelCase")]
    UserCountUpdate { count: usize },
    /// A chat line, fanned out to every member including the sender
    ChatMessage(ChatMessage),
    /// A video was set as the room's current video
    #[serde(rename_all = "camelCase")]
    VideoLoaded {
        video: VideoDescriptor,
        state: PlaybackState,
        user: MemberInfo,
    },
    /// Broadcast after every accepted control, including to the originator
    #[serde(rename_all = "camelCase")]
    VideoControl { state: PlaybackState },
    /// Acknowledgement to the originator of a request
    #[serde(rename_all = "camelCase")]
    Ack {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<ErrorCode>,
    },
}

impl ServerMessage {
    /// Positive acknowledgement carrying the assigned version.
    pub fn ack(version: u64) -> Self {
        Self::Ack {
            ok: true,
            version: Some(version),
            reason: None,
        }
    }

    /// Negative acknowledgement with a reason code.
    pub fn nack(reason: ErrorCode) -> Self {
        Self::Ack {
            ok: false,
            version: None,
            reason: Some(reason),
        }
    }
}
