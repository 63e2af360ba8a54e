//! Inbound payload validation against the protocol configuration.
//!
//! All checks return `Err(reason)` with a human-readable reason string that
//! is safe to log; callers map failures to `ErrorCode::BadRequest` on the
//! wire.

use crate::config::ProtocolConfig;

/// Validate a canonicalized room code: exact configured length, uppercase
/// alphanumerics only.
pub fn validate_room_code(code: &str, config: &ProtocolConfig) -> Result<(), String> {
    if code.len() != config.room_code_length {
        return Err(format!(
            "room code must be exactly {} characters",
            config.room_code_length
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err("room code must contain only uppercase letters and digits".to_string());
    }
    Ok(())
}

/// Validate a member nickname: non-empty after trimming, bounded length.
pub fn validate_nickname(nickname: &str, config: &ProtocolConfig) -> Result<(), String> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err("nickname must not be empty".to_string());
    }
    if trimmed != nickname {
        return Err("nickname must not have leading or trailing whitespace".to_string());
    }
    if nickname.chars().count() > config.max_nickname_length {
        return Err(format!(
            "nickname must be at most {} characters",
            config.max_nickname_length
        ));
    }
    if nickname.chars().any(char::is_control) {
        return Err("nickname must not contain control characters".to_string());
    }
    Ok(())
}

/// Validate a user id: non-empty opaque string, bounded so a hostile client
/// cannot balloon the member map.
pub fn validate_user_id(user_id: &str) -> Result<(), String> {
    if user_id.is_empty() {
        return Err("user id must not be empty".to_string());
    }
    if user_id.len() > 128 {
        return Err("user id must be at most 128 bytes".to_string());
    }
    Ok(())
}

/// Validate chat text: non-empty, bounded length. Content is otherwise
/// untrusted and forwarded untouched.
pub fn validate_chat_text(text: &str, config: &ProtocolConfig) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("chat text must not be empty".to_string());
    }
    if text.chars().count() > config.max_chat_message_length {
        return Err(format!(
            "chat text must be at most {} characters",
            config.max_chat_message_length
        ));
    }
    Ok(())
}
