//! Protocol limits configuration.

use super::defaults::{
    default_max_chat_message_length, default_max_nickname_length, default_room_code_length,
};
use serde::{Deserialize, Serialize};

/// Limits applied when validating inbound protocol payloads.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Canonical room code length
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Maximum nickname length in characters
    #[serde(default = "default_max_nickname_length")]
    pub max_nickname_length: usize,
    /// Maximum chat message length in characters
    #[serde(default = "default_max_chat_message_length")]
    pub max_chat_message_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            max_nickname_length: default_max_nickname_length(),
            max_chat_message_length: default_max_chat_message_length(),
        }
    }
}
