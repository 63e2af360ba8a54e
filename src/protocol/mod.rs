// Protocol module: message types, validation, and playback state

pub mod error_codes;
pub mod messages;
pub mod playback;
pub mod room_codes;
pub mod types;
pub mod validation;

// Re-export everything for backward compatibility
// This allows external code to use `use crate::protocol::*`

pub use error_codes::ErrorCode;

pub use types::{
    ChatMessage, ConnectionId, MemberInfo, UserId, VideoDescriptor, DEFAULT_MAX_NICKNAME_LENGTH,
    DEFAULT_ROOM_CODE_LENGTH,
};

pub use messages::{ClientMessage, RoomStatePayload, ServerMessage};

pub use playback::{ControlAction, PlaybackPhase, PlaybackState};

pub use room_codes::{generate_room_code, generate_room_code_with_config, normalize_room_code};
