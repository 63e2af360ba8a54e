use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::UserId;

// ============================================================================
// PLAYBACK LIFECYCLE
// ============================================================================
//
// Each room carries at most one authoritative PlaybackState. The state is
// created the moment a video is first loaded and is replaced wholesale when
// another video is loaded. Every accepted transition bumps `version` by one;
// the version is the only ordering signal clients trust.
//
// ```text
// [*] --> Paused: video loaded (reset to t=0)
//
// Paused --> Playing: play
// Playing --> Paused: pause
// Playing --> Playing: seek (time changes, liveness preserved)
// Paused --> Paused: seek
//
// any --> Paused: another video loaded (fresh reset, version keeps rising)
// any --> [*]: room destroyed
// ```
//
// Idempotent re-plays and re-pauses still increment the version. That is
// deliberate: a late joiner comparing versions can always tell which state
// is newest without inspecting timestamps.
//
// The server never extrapolates `current_time` from its own clock. The time
// is whatever the most recent accepted control asserted; drift correction is
// a client-local concern.
// ============================================================================

/// The three playback intents clients may request.
///
/// Periodic time-drift reports are not a control and are not accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Play,
    Pause,
    Seek,
}

/// Coarse room playback phase, derived from the authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No video has been loaded yet
    Idle,
    Paused,
    Playing,
}

/// The authoritative playback tuple the server broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Strictly increasing over the room's lifetime, starting at 1 for the
    /// first loaded video
    pub version: u64,
    pub video_id: String,
    /// Seconds, non-negative
    pub current_time: f64,
    pub is_playing: bool,
    pub last_updated_by: UserId,
    pub last_updated_at: DateTime<Utc>,
}

impl PlaybackState {
    /// Fresh state for a newly loaded video: paused at zero, one version past
    /// whatever the room held before.
    pub fn for_video(previous_version: u64, video_id: String, loaded_by: UserId) -> Self {
        Self {
            version: previous_version + 1,
            video_id,
            current_time: 0.0,
            is_playing: false,
            last_updated_by: loaded_by,
            last_updated_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.is_playing {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::Paused
        }
    }

    /// Apply an accepted control in place.
    ///
    /// The caller has already verified the control's video id matches this
    /// state. `explicit_liveness` is honoured for `Seek` only; `Play` and
    /// `Pause` assert their own liveness regardless of the payload.
    pub fn apply_control(
        &mut self,
        action: ControlAction,
        current_time: f64,
        explicit_liveness: Option<bool>,
        by: UserId,
    ) {
        self.version += 1;
        self.current_time = current_time.max(0.0);
        self.is_playing = match action {
            ControlAction::Play => true,
            ControlAction::Pause => false,
            // A seek during playback stays playing, a seek while paused
            // stays paused, unless the payload says otherwise.
            ControlAction::Seek => explicit_liveness.unwrap_or(self.is_playing),
        };
        self.last_updated_by = by;
        self.last_updated_at = Utc::now();
    }
}
