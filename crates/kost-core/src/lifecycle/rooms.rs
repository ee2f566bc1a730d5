use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use super::domain::{Room, RoomId, RoomStatus};
use super::repository::LifecycleStore;
use super::LifecycleError;

static ROOM_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_room_id() -> RoomId {
    let id = ROOM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RoomId(format!("room-{id:04}"))
}

/// Attributes for registering a room into the inventory.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRoom {
    pub number: String,
    pub category: String,
    pub monthly_rate: u64,
    pub floor: u8,
    pub capacity: u8,
}

/// Listing filter; both fields optional, combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomFilter {
    pub status: Option<RoomStatus>,
    pub category: Option<String>,
}

/// Inventory registry. Owns `Room.status` as a cached occupancy view;
/// only the tenancy ledger and reconciliation coordinator may flip it,
/// which is why `set_occupancy` stays crate-internal.
pub struct RoomRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for RoomRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LifecycleStore> RoomRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register_room(&self, new_room: NewRoom) -> Result<Room, LifecycleError> {
        let number = new_room.number.trim().to_string();
        if number.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "room number must not be empty".to_string(),
            ));
        }
        if new_room.monthly_rate == 0 {
            return Err(LifecycleError::InvalidInput(
                "monthly rate must be positive".to_string(),
            ));
        }
        if new_room.capacity == 0 {
            return Err(LifecycleError::InvalidInput(
                "room capacity must be at least one".to_string(),
            ));
        }

        let room = Room {
            id: next_room_id(),
            number,
            category: new_room.category,
            monthly_rate: new_room.monthly_rate,
            floor: new_room.floor,
            capacity: new_room.capacity,
            status: RoomStatus::Available,
        };
        Ok(self.store.insert_room(room)?)
    }

    pub fn get_room(&self, id: &RoomId) -> Result<Room, LifecycleError> {
        self.store
            .fetch_room(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("room '{}' not found", id.0)))
    }

    /// Rooms matching the filter, stable-ordered by room number.
    pub fn list_rooms(&self, filter: &RoomFilter) -> Result<Vec<Room>, LifecycleError> {
        let mut rooms: Vec<Room> = self
            .store
            .list_rooms()?
            .into_iter()
            .filter(|room| {
                filter.status.map_or(true, |status| room.status == status)
                    && filter
                        .category
                        .as_deref()
                        .map_or(true, |category| room.category == category)
            })
            .collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(rooms)
    }

    /// Flip the cached occupancy view. Occupying an occupied room is a
    /// caller bug and signals `Conflict`; freeing is idempotent so the
    /// reconciliation saga can safely repeat it.
    pub(crate) fn set_occupancy(&self, id: &RoomId, occupied: bool) -> Result<Room, LifecycleError> {
        let mut room = self.get_room(id)?;
        if occupied {
            if room.status == RoomStatus::Occupied {
                return Err(LifecycleError::Conflict(format!(
                    "room '{}' is already occupied",
                    room.number
                )));
            }
            room.status = RoomStatus::Occupied;
        } else {
            room.status = RoomStatus::Available;
        }
        self.store.update_room(room.clone())?;
        Ok(room)
    }
}
