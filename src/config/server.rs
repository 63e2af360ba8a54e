//! Server behavior configuration types.

use super::defaults::{
    default_chat_history_cap, default_cors_origins, default_max_message_size,
    default_room_state_chat_slice,
};
use serde::{Deserialize, Serialize};

/// Configuration for room coordination behavior.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Chat messages retained per room; the oldest is evicted first
    #[serde(default = "default_chat_history_cap")]
    pub chat_history_cap: usize,
    /// How many trailing chat messages a joiner receives in `room-state`
    #[serde(default = "default_room_state_chat_slice")]
    pub room_state_chat_slice: usize,
    /// Maximum accepted WebSocket frame size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Comma-separated allowed CORS origins, or "*" for permissive
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            chat_history_cap: default_chat_history_cap(),
            room_state_chat_slice: default_room_state_chat_slice(),
            max_message_size: default_max_message_size(),
            cors_origins: default_cors_origins(),
        }
    }
}
