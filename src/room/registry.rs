use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::shared::ConnectionId;

/// Result of a leave operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveRoomResult {
    /// Connection left; other members remain
    Left,
    /// Connection was the last member, so the room is gone
    RoomDeleted,
    /// Connection was not a member (or the room does not exist)
    NotMember,
}

/// Bidirectional membership mapping between rooms and connections.
///
/// Both directions are updated together by every mutation, so a connection
/// lists a room iff the room lists the connection, and no room is ever kept
/// with an empty member set.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    // room name -> members
    rooms: HashMap<String, HashSet<ConnectionId>>,
    // connection -> joined rooms
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to the room, creating the room if absent.
    /// Returns false if the connection was already a member.
    pub fn join(&mut self, connection_id: ConnectionId, room: &str) -> bool {
        let added = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);

        if added {
            self.memberships
                .entry(connection_id)
                .or_default()
                .insert(room.to_string());
            debug!(connection_id = %connection_id, room = %room, "Joined room");
        }

        added
    }

    /// Removes the connection from the room, deleting the room once empty
    pub fn leave(&mut self, connection_id: ConnectionId, room: &str) -> LeaveRoomResult {
        let Some(members) = self.rooms.get_mut(room) else {
            return LeaveRoomResult::NotMember;
        };

        if !members.remove(&connection_id) {
            return LeaveRoomResult::NotMember;
        }

        let emptied = members.is_empty();
        if emptied {
            self.rooms.remove(room);
        }

        if let Some(rooms) = self.memberships.get_mut(&connection_id) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.memberships.remove(&connection_id);
            }
        }

        debug!(
            connection_id = %connection_id,
            room = %room,
            room_deleted = emptied,
            "Left room"
        );

        if emptied {
            LeaveRoomResult::RoomDeleted
        } else {
            LeaveRoomResult::Left
        }
    }

    /// Snapshot of the room's members; empty if the room does not exist
    pub fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the rooms a connection has joined
    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<String> {
        self.memberships
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection_id: ConnectionId, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    pub fn room_names(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }
}
