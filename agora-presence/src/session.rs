use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use agora_core::models::{ConferenceId, ConnectionId, ParticipantId, RoomId};

/// Live binding between a connection and a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub participant_id: ParticipantId,
    pub conference_id: ConferenceId,
    pub room_id: RoomId,
    pub joined_at: DateTime<Utc>,
}

/// Connection → session map plus the inverse participant → connection index
///
/// Both maps are only mutated while the owning conference is locked, so the
/// coordinator never observes one without the other.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ConnectionId, Session>>,
    participants: Arc<DashMap<(ConferenceId, ParticipantId), ConnectionId>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a participant in a conference room
    pub fn register(
        &self,
        connection_id: ConnectionId,
        participant_id: ParticipantId,
        conference_id: ConferenceId,
        room_id: RoomId,
    ) {
        self.participants.insert(
            (conference_id.clone(), participant_id.clone()),
            connection_id.clone(),
        );
        self.sessions.insert(
            connection_id.clone(),
            Session {
                participant_id,
                conference_id,
                room_id,
                joined_at: Utc::now(),
            },
        );

        debug!(
            connection_id = %connection_id,
            total_sessions = self.sessions.len(),
            "Session registered"
        );
    }

    #[must_use]
    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<Session> {
        self.sessions.get(connection_id).map(|s| s.value().clone())
    }

    /// Record a room change; returns false when the connection has no session
    pub fn update_room(&self, connection_id: &ConnectionId, room_id: RoomId) -> bool {
        if let Some(mut session) = self.sessions.get_mut(connection_id) {
            session.room_id = room_id;
            true
        } else {
            false
        }
    }

    /// Remove a connection's session and its inverse index entry
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Session> {
        let (_, session) = self.sessions.remove(connection_id)?;

        self.participants.remove_if(
            &(session.conference_id.clone(), session.participant_id.clone()),
            |_, bound| bound == connection_id,
        );

        debug!(
            connection_id = %connection_id,
            participant_id = %session.participant_id,
            conference_id = %session.conference_id,
            "Session removed"
        );

        Some(session)
    }

    /// Connection currently bound to a participant of a conference
    #[must_use]
    pub fn connection_for(
        &self,
        conference_id: &ConferenceId,
        participant_id: &ParticipantId,
    ) -> Option<ConnectionId> {
        self.participants
            .get(&(conference_id.clone(), participant_id.clone()))
            .map(|c| c.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
