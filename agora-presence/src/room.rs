//! Room manager: rooms live inside their conference and are created on demand

use chrono::{DateTime, Utc};
use indexmap::{map::Entry, IndexSet};
use tracing::info;

use agora_core::models::{Message, ParticipantId, RoomId, RoomOptions, RoomSummary};

use crate::conference::Conference;

/// Sub-session of a conference with its own members and chat history
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Member IDs in entry order
    pub participants: IndexSet<ParticipantId>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
    pub template: Option<String>,
    pub description: Option<String>,
    pub capacity: usize,
}

impl Room {
    #[must_use]
    pub fn new(id: RoomId, options: RoomOptions, default_capacity: usize) -> Self {
        let name = options
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                if id.is_main() {
                    "Main Room".to_string()
                } else {
                    format!("Room {id}")
                }
            });

        Self {
            name,
            participants: IndexSet::new(),
            messages: Vec::new(),
            created_at: Utc::now(),
            is_private: options.is_private,
            template: options.template,
            description: options.description,
            capacity: options
                .capacity
                .filter(|c| *c > 0)
                .unwrap_or(default_capacity),
            id,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether another participant would exceed capacity; main is never full
    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.id.is_main() && self.participants.len() >= self.capacity
    }

    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            participant_count: self.participants.len(),
            is_private: self.is_private,
            template: self.template.clone(),
            description: self.description.clone(),
            capacity: self.capacity,
        }
    }
}

impl Conference {
    /// Fetch a room, creating it with `options` when absent
    ///
    /// Options are ignored for an existing room.
    pub fn get_or_create_room(
        &mut self,
        room_id: &RoomId,
        options: Option<RoomOptions>,
        default_capacity: usize,
    ) -> (&mut Room, bool) {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let room = Room::new(room_id.clone(), options.unwrap_or_default(), default_capacity);
                info!(
                    conference_id = %self.id,
                    room_id = %room_id,
                    capacity = room.capacity,
                    "Room created"
                );
                (entry.insert(room), true)
            }
        }
    }

    /// Delete a room if it has no members; `main` is never removed
    pub fn remove_room_if_empty(&mut self, room_id: &RoomId) -> bool {
        if room_id.is_main() {
            return false;
        }

        let empty = self.rooms.get(room_id).is_some_and(Room::is_empty);
        if empty {
            self.rooms.shift_remove(room_id);
            info!(conference_id = %self.id, room_id = %room_id, "Empty room removed");
        }
        empty
    }
}
