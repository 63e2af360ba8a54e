//! The room registry: room code → live room, with atomic create/destroy.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::room::Room;

/// Shared handle to one room and its serialiser.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Maps room codes to rooms. Creation and destruction are atomic with
/// respect to joins: a destroyed room is marked closed under its own lock
/// before its registry entry is removed, and `acquire` retries past closed
/// rooms, so a join racing a destruction always lands in a fresh room.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    chat_cap: usize,
}

impl RoomRegistry {
    pub fn new(chat_cap: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            chat_cap,
        }
    }

    /// Look up or create the room for `code` and lock its serialiser.
    pub async fn acquire(&self, code: &str) -> (RoomHandle, OwnedMutexGuard<Room>) {
        loop {
            let handle = self
                .rooms
                .entry(code.to_string())
                .or_insert_with(|| {
                    tracing::debug!(room_code = code, "Creating room");
                    Arc::new(Mutex::new(Room::new(code.to_string(), self.chat_cap)))
                })
                .clone();

            let guard = handle.clone().lock_owned().await;
            if !guard.is_closed() {
                return (handle, guard);
            }

            // Lost the race against destruction. Drop the stale entry if it
            // is still ours and try again against a fresh room.
            drop(guard);
            self.rooms
                .remove_if(code, |_, existing| Arc::ptr_eq(existing, &handle));
        }
    }

    /// Look up an existing room without creating one.
    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.clone())
    }

    /// Remove a room's registry entry. The caller holds the room's lock and
    /// has already marked it closed; the entry is only removed if it still
    /// refers to that same room.
    pub fn destroy(&self, code: &str, handle: &RoomHandle) {
        self.rooms
            .remove_if(code, |_, existing| Arc::ptr_eq(existing, handle));
        tracing::debug!(room_code = code, "Destroyed room");
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
