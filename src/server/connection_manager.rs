use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::protocol::{ConnectionId, ServerMessage, UserId};

/// Per-connection record. The membership back-reference exists only so the
/// gateway can route a disconnect to the right room; room fields are never
/// read through it.
#[derive(Debug, Clone)]
pub(crate) struct ClientConnection {
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub client_addr: SocketAddr,
    pub membership: Option<(String, UserId)>,
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionManager {
    connections: DashMap<ConnectionId, ClientConnection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        self.connections.insert(
            connection_id,
            ClientConnection {
                sender,
                client_addr,
                membership: None,
            },
        );
        info!(%connection_id, %client_addr, "Connection established");
        connection_id
    }

    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<ClientConnection> {
        self.connections
            .remove(connection_id)
            .map(|(_, connection)| connection)
    }

    pub fn sender(&self, connection_id: &ConnectionId) -> Option<mpsc::Sender<Arc<ServerMessage>>> {
        self.connections
            .get(connection_id)
            .map(|connection| connection.sender.clone())
    }

    pub fn membership(&self, connection_id: &ConnectionId) -> Option<(String, UserId)> {
        self.connections
            .get(connection_id)
            .and_then(|connection| connection.membership.clone())
    }

    pub fn set_membership(&self, connection_id: &ConnectionId, room_code: String, user_id: UserId) {
        if let Some(mut connection) = self.connections.get_mut(connection_id) {
            connection.membership = Some((room_code, user_id));
        }
    }

    /// Drop the membership back-reference, leaving the connection itself
    /// registered. Used both on leave and when a re-join orphans a prior
    /// connection.
    pub fn clear_membership(&self, connection_id: &ConnectionId) {
        if let Some(mut connection) = self.connections.get_mut(connection_id) {
            connection.membership = None;
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
