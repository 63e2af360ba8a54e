//! Main server orchestration.
//!
//! `SyncServer` wires the connection gateway, room registry, per-room
//! coordinators, and the media store together. All room mutations funnel
//! through the handlers in `room_service` and `playback_service`, which hold
//! the room's serialiser for the duration of each request.

pub mod connection_manager;
pub mod message_router;
pub mod playback_service;
pub mod registry;
pub mod room;
pub mod room_service;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::media::MediaStore;
use crate::protocol::{ConnectionId, ServerMessage, VideoDescriptor};

use connection_manager::ConnectionManager;
use registry::RoomRegistry;

pub use room::Room;

/// Response body for `GET /api/room/{code}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub code: String,
    pub user_count: usize,
    pub current_video: Option<VideoDescriptor>,
    pub created_at: DateTime<Utc>,
}

pub struct SyncServer {
    config: Config,
    registry: RoomRegistry,
    connections: ConnectionManager,
    media: MediaStore,
}

impl SyncServer {
    /// Build the server, opening the media store (the uploads directory is
    /// created if absent).
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let media = MediaStore::open(&config.media).await?;
        Ok(Arc::new(Self {
            registry: RoomRegistry::new(config.server.chat_history_cap),
            connections: ConnectionManager::new(),
            media,
            config,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Number of live rooms, for logs and tests.
    pub fn room_count(&self) -> usize {
        self.registry.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    /// Register a new client connection with its send queue.
    pub fn register_client(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> ConnectionId {
        self.connections.register(sender, client_addr)
    }

    /// Tear down a connection. If it holds a room membership, a synthetic
    /// leave runs through the ordinary coordinator path. Idempotent: the
    /// second caller finds the connection gone and does nothing.
    pub async fn unregister_client(&self, connection_id: &ConnectionId) {
        let Some(connection) = self.connections.unregister(connection_id) else {
            return;
        };
        tracing::info!(%connection_id, client_addr = %connection.client_addr, "Connection closed");
        if let Some((room_code, user_id)) = connection.membership {
            self.leave_membership(connection_id, &room_code, &user_id)
                .await;
        }
    }

    /// Room summary for the HTTP surface; `None` once the room is destroyed.
    pub async fn room_info(&self, room_code: &str) -> Option<RoomInfo> {
        let handle = self.registry.get(room_code)?;
        let room = handle.lock().await;
        if room.is_closed() {
            return None;
        }
        Some(RoomInfo {
            code: room.code().to_string(),
            user_count: room.member_count(),
            current_video: room.current_video().cloned(),
            created_at: room.created_at(),
        })
    }
}
