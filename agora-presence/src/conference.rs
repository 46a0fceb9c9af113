use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use agora_core::models::{
    ConferenceId, ConnectionId, Participant, ParticipantId, RoomId, RoomOptions, RoomSummary,
};

use crate::room::Room;

/// Live conference state, always accessed under its directory mutex
#[derive(Debug)]
pub struct Conference {
    pub(crate) id: ConferenceId,
    pub(crate) participants: IndexMap<ParticipantId, Participant>,
    pub(crate) rooms: IndexMap<RoomId, Room>,
    pub(crate) created_at: DateTime<Utc>,
    next_join_order: u64,
    /// Set once the directory has dropped this conference
    pub(crate) closed: bool,
}

/// Read-only copy of a conference for collaborators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceSnapshot {
    pub id: ConferenceId,
    pub participants: Vec<Participant>,
    pub rooms: Vec<RoomSummary>,
    pub created_at: DateTime<Utc>,
}

impl Conference {
    /// Create a conference holding only the main room
    #[must_use]
    pub fn new(id: ConferenceId, default_room_capacity: usize) -> Self {
        let mut rooms = IndexMap::new();
        rooms.insert(
            RoomId::main(),
            Room::new(RoomId::main(), RoomOptions::default(), default_room_capacity),
        );

        Self {
            id,
            participants: IndexMap::new(),
            rooms,
            created_at: Utc::now(),
            next_join_order: 0,
            closed: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &ConferenceId {
        &self.id
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn participant(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    #[must_use]
    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    #[must_use]
    pub fn host(&self) -> Option<&Participant> {
        self.participants.values().find(|p| p.is_host)
    }

    /// Hand out the next position in the join sequence
    pub fn take_join_order(&mut self) -> u64 {
        let order = self.next_join_order;
        self.next_join_order += 1;
        order
    }

    /// Insert a participant into the conference and its room
    ///
    /// The participant's room must already exist.
    pub(crate) fn admit(&mut self, participant: Participant) {
        if let Some(room) = self.rooms.get_mut(&participant.room_id) {
            room.participants.insert(participant.id.clone());
        }
        self.participants.insert(participant.id.clone(), participant);
    }

    /// Remove a participant from its room and the conference
    pub(crate) fn evict(&mut self, participant_id: &ParticipantId) -> Option<Participant> {
        let participant = self.participants.shift_remove(participant_id)?;
        if let Some(room) = self.rooms.get_mut(&participant.room_id) {
            room.participants.shift_remove(participant_id);
        }
        Some(participant)
    }

    #[must_use]
    pub fn participant_list(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    #[must_use]
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.values().map(Room::summary).collect()
    }

    /// Members of a room, in room entry order
    #[must_use]
    pub fn room_members(&self, room_id: &RoomId) -> Vec<Participant> {
        self.rooms
            .get(room_id)
            .map(|room| {
                room.participants
                    .iter()
                    .filter_map(|id| self.participants.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections of every member of a room
    #[must_use]
    pub fn room_connections(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| {
                room.participants
                    .iter()
                    .filter_map(|id| self.participants.get(id))
                    .map(|p| p.connection_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections of every participant in the conference
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.participants
            .values()
            .map(|p| p.connection_id.clone())
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> ConferenceSnapshot {
        ConferenceSnapshot {
            id: self.id.clone(),
            participants: self.participant_list(),
            rooms: self.room_summaries(),
            created_at: self.created_at,
        }
    }
}
