//! The viewer-side convergence engine.
//!
//! Deterministic state machine between the player and the wire: inbound
//! authoritative states pass a strict version gate and take an apply-lock
//! while they are installed; outbound user intents are suppressed under the
//! lock and debounced. Time is injected so every rule is unit-testable.

use std::time::{Duration, Instant};

use crate::protocol::{ControlAction, PlaybackState};

/// Quiescence window after an apply completes; player callbacks fired by the
/// apply itself land inside it and are not re-broadcast.
pub const APPLY_QUIESCENCE: Duration = Duration::from_millis(150);
/// Window within which an identical control payload is collapsed.
pub const EMIT_DEBOUNCE: Duration = Duration::from_millis(150);
/// Local drift beyond this many seconds forces a hard seek on apply.
pub const DRIFT_THRESHOLD_SECS: f64 = 0.35;
/// Emit-side times are bucketed to this granularity for debounce comparison.
const TIME_BUCKET_MS: u64 = 100;

/// What to do with an inbound authoritative state.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Install into the player; `hard_seek` when drift exceeded the threshold
    Apply {
        state: PlaybackState,
        hard_seek: bool,
    },
    /// References a video the player has not loaded; buffered for later
    Deferred,
    /// At or below the locally observed version; dropped
    Stale,
}

/// A local intent that survived the apply-lock and debounce.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlIntent {
    pub action: ControlAction,
    pub current_time: f64,
    /// Always set for play/pause; absent for seek, where the server inherits
    /// liveness from the authoritative state
    pub is_playing: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EmitFingerprint {
    action: ControlAction,
    time_bucket: u64,
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    observed_version: u64,
    loaded_video: Option<String>,
    applying: bool,
    quiescent_until: Option<Instant>,
    /// Exactly one most-recent state awaiting its video
    pending: Option<PlaybackState>,
    last_emit: Option<(EmitFingerprint, Instant)>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed_version(&self) -> u64 {
        self.observed_version
    }

    pub fn loaded_video(&self) -> Option<&str> {
        self.loaded_video.as_deref()
    }

    /// True while local control events must be suppressed.
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.applying || self.quiescent_until.is_some_and(|until| now < until)
    }

    /// Gate an inbound authoritative state.
    ///
    /// On `Apply` the engine enters the apply-lock; the caller installs the
    /// state into the player and then calls [`finish_apply`](Self::finish_apply).
    pub fn observe(
        &mut self,
        state: PlaybackState,
        local_position: f64,
        _now: Instant,
    ) -> Observation {
        if state.version <= self.observed_version {
            return Observation::Stale;
        }

        if self.loaded_video.as_deref() != Some(state.video_id.as_str()) {
            // Keep only the newest pending state
            let newer = self
                .pending
                .as_ref()
                .is_none_or(|pending| state.version > pending.version);
            if newer {
                self.pending = Some(state);
            }
            return Observation::Deferred;
        }

        self.observed_version = state.version;
        self.applying = true;
        self.quiescent_until = None;
        let hard_seek = (local_position - state.current_time).abs() > DRIFT_THRESHOLD_SECS;
        Observation::Apply { state, hard_seek }
    }

    /// The apply finished; suppression continues through the quiescence
    /// window so the player's own callbacks settle silently.
    pub fn finish_apply(&mut self, now: Instant) {
        self.applying = false;
        self.quiescent_until = Some(now + APPLY_QUIESCENCE);
    }

    /// Declare which video the player has loaded to a playable state.
    /// Returns a buffered state for that video, ready to be observed again.
    pub fn video_ready(&mut self, video_id: String) -> Option<PlaybackState> {
        self.loaded_video = Some(video_id);
        let pending = self.pending.take()?;
        if Some(pending.video_id.as_str()) == self.loaded_video.as_deref()
            && pending.version > self.observed_version
        {
            Some(pending)
        } else if Some(pending.video_id.as_str()) != self.loaded_video.as_deref() {
            // Still waiting on a different video
            self.pending = Some(pending);
            None
        } else {
            None
        }
    }

    /// Gate a local user intent. Returns the payload to emit, or `None` when
    /// the apply-lock, quiescence window, or debounce swallows it.
    pub fn local_intent(
        &mut self,
        action: ControlAction,
        current_time: f64,
        _is_playing: bool,
        now: Instant,
    ) -> Option<ControlIntent> {
        if self.is_suppressed(now) {
            return None;
        }

        let fingerprint = EmitFingerprint {
            action,
            time_bucket: millis_bucket(current_time),
        };
        if let Some((last, at)) = self.last_emit {
            if last == fingerprint && now.duration_since(at) < EMIT_DEBOUNCE {
                return None;
            }
        }
        self.last_emit = Some((fingerprint, now));

        Some(ControlIntent {
            action,
            current_time,
            is_playing: match action {
                ControlAction::Play => Some(true),
                ControlAction::Pause => Some(false),
                ControlAction::Seek => None,
            },
        })
    }
}

fn millis_bucket(current_time: f64) -> u64 {
    (current_time.max(0.0) * 1000.0) as u64 / TIME_BUCKET_MS
}
