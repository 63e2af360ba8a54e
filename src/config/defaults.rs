//! Default value functions referenced from serde attributes.

use super::logging::LogFormat;

pub const fn default_port() -> u16 {
    3000
}

// --- server ---

pub const fn default_chat_history_cap() -> usize {
    100
}

pub const fn default_room_state_chat_slice() -> usize {
    50
}

pub const fn default_max_message_size() -> usize {
    64 * 1024
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// --- protocol ---

pub const fn default_room_code_length() -> usize {
    6
}

pub const fn default_max_nickname_length() -> usize {
    20
}

pub const fn default_max_chat_message_length() -> usize {
    2000
}

// --- media ---

pub fn default_uploads_dir() -> String {
    "uploads".to_string()
}

/// 2 GiB; large enough for a feature-length file, small enough to bound a
/// hostile upload.
pub const fn default_max_upload_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

// --- logging ---

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
