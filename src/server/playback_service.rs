//! The playback control path: server-sequenced state transitions.
//!
//! Controls pass through one writer per room, so there are no ties: the
//! first to enter the critical section wins and later controls observe the
//! already-updated state. Periodic client time reports are not a control and
//! never reach this path; the only inputs are play, pause, and seek.

use std::sync::Arc;

use crate::protocol::{ConnectionId, ControlAction, ErrorCode, ServerMessage, UserId};

use super::SyncServer;

impl SyncServer {
    /// Apply one `video-control` request.
    ///
    /// Accepted iff the control's video id matches the room's authoritative
    /// state. Every accepted control bumps the version and is broadcast to
    /// all members, the originator included, so the originator learns the
    /// version it now owns; the originator additionally gets an ack carrying
    /// that version. Rejected controls change nothing and only the
    /// originator hears about them.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_video_control(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: UserId,
        video_id: String,
        action: ControlAction,
        current_time: f64,
        is_playing: Option<bool>,
        client_sent_at: Option<f64>,
    ) {
        if !current_time.is_finite() {
            tracing::warn!(%connection_id, room_code, "Rejected video-control with non-finite time");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }

        let Some(handle) = self.registry.get(room_code) else {
            self.nack_connection(connection_id, ErrorCode::NotFound);
            return;
        };
        let mut room = handle.lock().await;
        if room.is_closed() {
            self.nack_connection(connection_id, ErrorCode::NotFound);
            return;
        }
        if room.member_connection(&user_id) != Some(*connection_id) {
            tracing::warn!(%connection_id, room_code, user_id = %user_id, "video-control from non-member connection");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }

        match room.apply_control(&video_id, action, current_time, is_playing, &user_id) {
            Ok(state) => {
                tracing::debug!(
                    room_code,
                    user_id = %user_id,
                    action = ?action,
                    version = state.version,
                    current_time = state.current_time,
                    is_playing = state.is_playing,
                    client_sent_at,
                    "Applied playback control"
                );

                let mut stale =
                    room.broadcast(&Arc::new(ServerMessage::VideoControl {
                        state: state.clone(),
                    }));
                if !room.send_to(&user_id, Arc::new(ServerMessage::ack(state.version))) {
                    stale.push(user_id);
                }
                self.reap_stale(&handle, &mut room, room_code, stale);
            }
            Err(reason) => {
                tracing::debug!(
                    room_code,
                    user_id = %user_id,
                    video_id = %video_id,
                    %reason,
                    "Rejected playback control"
                );
                drop(room);
                self.nack_connection(connection_id, reason);
            }
        }
    }
}
