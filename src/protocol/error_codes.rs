use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling.
///
/// These appear both in HTTP error bodies (`{"error": ...}`) and in
/// message-protocol acknowledgements (`{"ok": false, "reason": ...}`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Malformed wire payload, missing fields, or a non-video upload
    BadRequest,
    /// Unknown room code or media storage key
    NotFound,
    /// Byte range outside the stored object
    RangeNotSatisfiable,
    /// Upload exceeds the configured size cap
    TooLarge,
    /// Control referenced a video that is not currently loaded
    VideoMismatch,
    /// Connection write failure or file read failure mid-stream
    TransientIo,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::BadRequest => {
                "The request was malformed or missing required fields. Check the payload shape."
            }
            Self::NotFound => "The requested room or media object does not exist.",
            Self::RangeNotSatisfiable => {
                "The requested byte range lies outside the stored object."
            }
            Self::TooLarge => "The upload exceeds the configured maximum size.",
            Self::VideoMismatch => {
                "The playback control referenced a video that is not currently loaded in the room."
            }
            Self::TransientIo => {
                "A connection or file operation failed mid-transfer. Retrying is safe."
            }
        }
    }

    /// The wire spelling of this code, matching its serde rename.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::NotFound => "not-found",
            Self::RangeNotSatisfiable => "range-not-satisfiable",
            Self::TooLarge => "too-large",
            Self::VideoMismatch => "video-mismatch",
            Self::TransientIo => "transient-io",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
