use crate::protocol::{normalize_room_code, ClientMessage, ConnectionId};

use super::SyncServer;

impl SyncServer {
    /// Handle one inbound client message. Room codes are case-folded here so
    /// every downstream handler sees the canonical form.
    pub async fn handle_client_message(&self, connection_id: &ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::JoinRoom {
                room_code,
                user_id,
                nickname,
            } => {
                self.handle_join_room(
                    connection_id,
                    &normalize_room_code(&room_code),
                    user_id,
                    nickname,
                )
                .await;
            }
            ClientMessage::LeaveRoom { room_code, user_id } => {
                self.handle_leave_room(connection_id, &normalize_room_code(&room_code), &user_id)
                    .await;
            }
            ClientMessage::ChatMessage {
                room_code,
                user_id,
                nickname,
                text,
            } => {
                self.handle_chat_message(
                    connection_id,
                    &normalize_room_code(&room_code),
                    user_id,
                    nickname,
                    text,
                )
                .await;
            }
            ClientMessage::VideoLoaded {
                room_code,
                user_id,
                video,
            } => {
                self.handle_video_loaded(
                    connection_id,
                    &normalize_room_code(&room_code),
                    user_id,
                    video,
                )
                .await;
            }
            ClientMessage::VideoControl {
                room_code,
                user_id,
                video_id,
                action,
                current_time,
                is_playing,
                client_sent_at,
            } => {
                self.handle_video_control(
                    connection_id,
                    &normalize_room_code(&room_code),
                    user_id,
                    video_id,
                    action,
                    current_time,
                    is_playing,
                    client_sent_at,
                )
                .await;
            }
        }
    }
}
