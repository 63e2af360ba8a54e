use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default constants for validation (can be overridden by config)
/// These are used when no config is available
#[allow(dead_code)]
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;
#[allow(dead_code)]
pub const DEFAULT_MAX_NICKNAME_LENGTH: usize = 20;

/// Client-asserted identity, stable across reconnects.
/// The server never authenticates it; it is only used to suppress own-echo
/// and to label chat.
pub type UserId = String;
/// Server-assigned identifier for a single WebSocket connection
pub type ConnectionId = Uuid;

/// Information about a room member as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub id: UserId,
    pub nickname: String,
    pub connected_at: DateTime<Utc>,
}

/// Describes an uploaded video and where its bytes live.
///
/// `storage_key` is the flat filename in the media store; in this design it
/// equals `id`, but clients must treat both as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub id: String,
    /// Display name, usually the original upload filename
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub mime_type: String,
    pub storage_key: String,
}

/// A single chat entry in a room's bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: UserId,
    pub nickname: String,
    /// Untrusted text; rendering clients must escape it
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Server-authored announcements (joins, video loads)
    #[serde(default)]
    pub system: bool,
}

impl ChatMessage {
    /// Mint a user-authored message with a fresh id and server timestamp.
    pub fn user(user_id: UserId, nickname: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            nickname,
            text,
            timestamp: Utc::now(),
            system: false,
        }
    }

    /// Mint a server-authored announcement.
    pub fn system(text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: UserId::new(),
            nickname: "server".to_string(),
            text,
            timestamp: Utc::now(),
            system: true,
        }
    }
}
