//! Configuration validation functions.

use super::Config;

/// Validate a loaded configuration.
///
/// Returns a newline-separated list of problems so the operator sees all of
/// them at once rather than fixing one per restart.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.server.chat_history_cap == 0 {
        problems.push("server.chat_history_cap must be at least 1".to_string());
    }
    if config.server.room_state_chat_slice > config.server.chat_history_cap {
        problems.push(format!(
            "server.room_state_chat_slice ({}) must not exceed server.chat_history_cap ({})",
            config.server.room_state_chat_slice, config.server.chat_history_cap
        ));
    }
    if config.server.max_message_size < 1024 {
        problems.push("server.max_message_size must be at least 1024 bytes".to_string());
    }

    if !(4..=12).contains(&config.protocol.room_code_length) {
        problems.push(format!(
            "protocol.room_code_length ({}) must be between 4 and 12",
            config.protocol.room_code_length
        ));
    }
    if config.protocol.max_nickname_length == 0 {
        problems.push("protocol.max_nickname_length must be at least 1".to_string());
    }
    if config.protocol.max_chat_message_length == 0 {
        problems.push("protocol.max_chat_message_length must be at least 1".to_string());
    }

    if config.media.uploads_dir.trim().is_empty() {
        problems.push("media.uploads_dir must not be empty".to_string());
    }
    if config.media.max_upload_size == 0 {
        problems.push("media.max_upload_size must be at least 1 byte".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}
