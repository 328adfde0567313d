//! Room registry
//!
//! Owns every `Room` record and enforces the room cap and lifecycle:
//! rooms are created empty, counted up and down as sessions join and leave,
//! and deleted on the decrement that brings them to zero.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::RoomError;
use crate::types::RoomId;

/// Maximum number of concurrent rooms
pub const MAX_ROOMS: usize = 20;

/// A broadcast group
#[derive(Debug, Clone)]
pub struct Room {
    /// Client-chosen identifier
    pub id: RoomId,
    /// Display label sent back in `SUCCESS|<name>`
    pub name: String,
    /// Number of active sessions bound to this room
    pub member_count: u32,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a new, empty room
    pub fn new(id: RoomId) -> Self {
        Self {
            name: id.display_name(),
            id,
            member_count: 0,
            created_at: Instant::now(),
        }
    }

    /// Time since the room was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Room id -> room state
///
/// Not synchronized itself; it is owned by the coordinator actor, which
/// makes every operation atomic with respect to other connections.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    max_rooms: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Create a registry with the standard room cap
    pub fn new() -> Self {
        Self::with_capacity(MAX_ROOMS)
    }

    /// Create a registry with a custom room cap
    pub fn with_capacity(max_rooms: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms,
        }
    }

    /// Create an empty room
    ///
    /// The id check comes before the capacity check, so a duplicate id is
    /// reported as such even when the registry is full.
    pub fn create_room(&mut self, id: RoomId) -> Result<&Room, RoomError> {
        if self.rooms.contains_key(&id) {
            return Err(RoomError::AlreadyExists(id));
        }
        if self.is_full() {
            return Err(RoomError::CapacityExceeded);
        }

        debug!("Room {} created", id);
        Ok(self.rooms.entry(id.clone()).or_insert_with(|| Room::new(id)))
    }

    /// Look up a room by id
    pub fn get_room(&self, id: &RoomId) -> Result<&Room, RoomError> {
        self.rooms
            .get(id)
            .ok_or_else(|| RoomError::NotFound(id.clone()))
    }

    /// Add one member, returning the new count
    pub fn increment_membership(&mut self, id: &RoomId) -> Result<u32, RoomError> {
        let room = self
            .rooms
            .get_mut(id)
            .ok_or_else(|| RoomError::NotFound(id.clone()))?;
        room.member_count += 1;
        Ok(room.member_count)
    }

    /// Remove one member
    ///
    /// Returns the remaining count, or `None` if the room was deleted
    /// because it became empty.
    pub fn decrement_membership(&mut self, id: &RoomId) -> Result<Option<u32>, RoomError> {
        let room = self
            .rooms
            .get_mut(id)
            .ok_or_else(|| RoomError::NotFound(id.clone()))?;
        room.member_count = room.member_count.saturating_sub(1);

        if room.member_count == 0 {
            let age = room.age();
            self.rooms.remove(id);
            debug!("Room {} deleted (empty) after {:?}", id, age);
            return Ok(None);
        }
        Ok(Some(room.member_count))
    }

    /// Number of rooms currently registered
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_full(&self) -> bool {
        self.rooms.len() >= self.max_rooms
    }
}
