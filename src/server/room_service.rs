//! Membership, chat, and video-load handling.
//!
//! Every handler acquires the target room's serialiser, mutates state, and
//! enqueues broadcasts before releasing it. Network writes never happen
//! under the lock; members only hold bounded send queues.

use std::sync::Arc;

use crate::protocol::{
    validation, ChatMessage, ConnectionId, ErrorCode, RoomStatePayload, ServerMessage, UserId,
    VideoDescriptor,
};

use super::registry::RoomHandle;
use super::room::Room;
use super::SyncServer;

impl SyncServer {
    /// Admit a member into a room, creating the room on first join.
    ///
    /// A join with a `user_id` already present replaces the prior handle and
    /// orphans its connection; peers see no membership churn for the
    /// replacement. A connection already in a different room is moved: the
    /// old membership is left first, so a connection is never in two rooms.
    pub async fn handle_join_room(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: UserId,
        nickname: String,
    ) {
        if let Err(reason) = validation::validate_room_code(room_code, &self.config.protocol) {
            tracing::warn!(%connection_id, room_code, reason = %reason, "Rejected join-room");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }
        if let Err(reason) = validation::validate_user_id(&user_id) {
            tracing::warn!(%connection_id, room_code, reason = %reason, "Rejected join-room");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }
        if let Err(reason) = validation::validate_nickname(&nickname, &self.config.protocol) {
            tracing::warn!(%connection_id, room_code, reason = %reason, "Rejected join-room");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }

        // A connection holds at most one membership
        if let Some((prev_room, prev_user)) = self.connections.membership(connection_id) {
            if prev_room != room_code || prev_user != user_id {
                self.leave_membership(connection_id, &prev_room, &prev_user)
                    .await;
            }
        }

        let Some(sender) = self.connections.sender(connection_id) else {
            // Connection went away while the join was queued
            return;
        };

        let (handle, mut room) = self.registry.acquire(room_code).await;
        let replaced = room.insert_member(user_id.clone(), nickname.clone(), *connection_id, sender);
        if let Some(old) = &replaced {
            if old.connection_id != *connection_id {
                // The superseded connection is orphaned; it is torn down on
                // its next write failure or transport close.
                self.connections.clear_membership(&old.connection_id);
            }
        }
        self.connections
            .set_membership(connection_id, room_code.to_string(), user_id.clone());

        let mut stale = Vec::new();

        // Snapshot to the joiner first, then peer notifications
        let snapshot = ServerMessage::RoomState(Box::new(RoomStatePayload {
            users: room.members(),
            messages: room.chat_tail(self.config.server.room_state_chat_slice),
            current_video: room.current_video().cloned(),
            playback: room.playback().cloned(),
        }));
        if !room.send_to(&user_id, Arc::new(snapshot)) {
            stale.push(user_id.clone());
        }

        if replaced.is_none() {
            let count = room.member_count();
            if let Some(user) = room.member_info(&user_id).cloned() {
                stale.extend(room.broadcast_except(
                    &user_id,
                    &Arc::new(ServerMessage::UserJoined {
                        user,
                        user_count: count,
                    }),
                ));
            }
            stale.extend(room.broadcast_except(
                &user_id,
                &Arc::new(ServerMessage::UserCountUpdate { count }),
            ));

            let announce = ChatMessage::system(format!("{nickname} joined the room"));
            room.push_chat(announce.clone());
            stale.extend(room.broadcast(&Arc::new(ServerMessage::ChatMessage(announce))));
        }

        tracing::info!(
            %connection_id,
            room_code,
            user_id = %user_id,
            member_count = room.member_count(),
            replaced = replaced.is_some(),
            "Member joined room"
        );

        self.reap_stale(&handle, &mut room, room_code, stale);
    }

    /// Explicit leave requested by the client.
    pub async fn handle_leave_room(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: &str,
    ) {
        self.leave_membership(connection_id, room_code, user_id)
            .await;
    }

    /// Remove a membership owned by `connection_id`, notifying peers and
    /// destroying the room if it empties. A no-op when the membership was
    /// already replaced by a newer connection or is gone.
    pub(super) async fn leave_membership(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: &str,
    ) {
        let Some(handle) = self.registry.get(room_code) else {
            return;
        };
        let mut room = handle.lock().await;
        if room.is_closed() {
            return;
        }
        if room.member_connection(user_id) != Some(*connection_id) {
            return;
        }
        let Some(member) = room.remove_member(user_id) else {
            return;
        };
        self.connections.clear_membership(connection_id);

        tracing::info!(
            %connection_id,
            room_code,
            user_id,
            member_count = room.member_count(),
            "Member left room"
        );

        let mut stale = Vec::new();
        if !room.is_empty() {
            let count = room.member_count();
            stale.extend(room.broadcast(&Arc::new(ServerMessage::UserLeft {
                user_id: member.info.id.clone(),
                user_count: count,
            })));
            stale.extend(room.broadcast(&Arc::new(ServerMessage::UserCountUpdate { count })));

            let announce = ChatMessage::system(format!("{} left the room", member.info.nickname));
            room.push_chat(announce.clone());
            stale.extend(room.broadcast(&Arc::new(ServerMessage::ChatMessage(announce))));
        }

        self.reap_stale(&handle, &mut room, room_code, stale);
    }

    /// Mint and fan out a chat message to every member, the sender included.
    pub async fn handle_chat_message(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: UserId,
        nickname: String,
        text: String,
    ) {
        if let Err(reason) = validation::validate_chat_text(&text, &self.config.protocol) {
            tracing::warn!(%connection_id, room_code, reason = %reason, "Rejected chat-message");
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
            tracing::warn!(%connection_id, room_code, user_id = %user_id, "Chat from non-member connection");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }

        let message = ChatMessage::user(user_id, nickname, text);
        room.push_chat(message.clone());
        let stale = room.broadcast(&Arc::new(ServerMessage::ChatMessage(message)));
        self.reap_stale(&handle, &mut room, room_code, stale);
    }

    /// Replace the room's current video and reset playback.
    ///
    /// Peers get the `video-loaded` broadcast; the sender gets a synchronous
    /// ack carrying the new version instead.
    pub async fn handle_video_loaded(
        &self,
        connection_id: &ConnectionId,
        room_code: &str,
        user_id: UserId,
        video: VideoDescriptor,
    ) {
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
            tracing::warn!(%connection_id, room_code, user_id = %user_id, "video-loaded from non-member connection");
            self.nack_connection(connection_id, ErrorCode::BadRequest);
            return;
        }
        let Some(user) = room.member_info(&user_id).cloned() else {
            return;
        };

        let state = room.load_video(video.clone(), &user_id);

        tracing::info!(
            room_code,
            user_id = %user_id,
            video_id = %video.id,
            video_name = %video.name,
            version = state.version,
            "Room video loaded"
        );

        let mut stale = room.broadcast_except(
            &user_id,
            &Arc::new(ServerMessage::VideoLoaded {
                video: video.clone(),
                state: state.clone(),
                user: user.clone(),
            }),
        );

        let announce = ChatMessage::system(format!("{} loaded {}", user.nickname, video.name));
        room.push_chat(announce.clone());
        stale.extend(room.broadcast(&Arc::new(ServerMessage::ChatMessage(announce))));

        if !room.send_to(&user_id, Arc::new(ServerMessage::ack(state.version))) {
            stale.push(user_id);
        }

        self.reap_stale(&handle, &mut room, room_code, stale);
    }

    /// Negative-acknowledge a request on its own connection.
    pub(super) fn nack_connection(&self, connection_id: &ConnectionId, reason: ErrorCode) {
        if let Some(sender) = self.connections.sender(connection_id) {
            let _ = sender.try_send(Arc::new(ServerMessage::nack(reason)));
        }
    }

    /// Drop members whose connections proved dead during a broadcast,
    /// notifying survivors. Runs inside the same critical section as the
    /// triggering mutation so peers never observe a half-dead membership,
    /// and destroys the room if it empties.
    pub(super) fn reap_stale(
        &self,
        handle: &RoomHandle,
        room: &mut Room,
        room_code: &str,
        mut stale: Vec<UserId>,
    ) {
        while let Some(user_id) = stale.pop() {
            let Some(member) = room.remove_member(&user_id) else {
                continue;
            };
            self.connections.clear_membership(&member.connection_id);
            tracing::warn!(
                room_code,
                user_id = %member.info.id,
                "Dropped member with dead connection"
            );
            if room.is_empty() {
                break;
            }
            let count = room.member_count();
            stale.extend(room.broadcast(&Arc::new(ServerMessage::UserLeft {
                user_id: member.info.id.clone(),
                user_count: count,
            })));
            stale.extend(room.broadcast(&Arc::new(ServerMessage::UserCountUpdate { count })));

            let announce = ChatMessage::system(format!("{} left the room", member.info.nickname));
            room.push_chat(announce.clone());
            stale.extend(room.broadcast(&Arc::new(ServerMessage::ChatMessage(announce))));
        }

        if room.is_empty() && !room.is_closed() {
            room.close();
            self.registry.destroy(room_code, handle);
            tracing::info!(room_code, "Room destroyed after last member left");
        }
    }
}
