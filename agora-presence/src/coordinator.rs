use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use agora_core::config::ConferenceConfig;
use agora_core::metrics::EVENTS_TOTAL;
use agora_core::models::{
    ConferenceId, ConnectionId, Participant, ParticipantId, RoomId, RoomOptions, RoomSummary,
};

use crate::conference::{Conference, ConferenceSnapshot};
use crate::directory::ConferenceDirectory;
use crate::error::{Error, Result};
use crate::events::{ClientEvent, ServerEvent, UserData};
use crate::host::elect_host;
use crate::hub::{ConnectionHub, Delivery, Scope};
use crate::session::{Session, SessionRegistry};

const DEFAULT_DISPLAY_NAME: &str = "Guest";
const KICK_REASON: &str = "You have been removed from the conference";

/// The calling participant, resolved from its connection under the conference lock
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub connection_id: ConnectionId,
    pub participant_id: ParticipantId,
    pub room_id: RoomId,
}

/// Owns every conference, session and mailbox
///
/// Each event runs to completion while holding its conference's lock, and
/// the resulting deliveries are queued before the lock is released, so all
/// connections observe one conference's events in the same order.
#[derive(Clone)]
pub struct Coordinator {
    directory: ConferenceDirectory,
    sessions: SessionRegistry,
    hub: ConnectionHub,
    config: Arc<ConferenceConfig>,
}

impl Coordinator {
    #[must_use]
    pub fn new(config: ConferenceConfig) -> Self {
        Self {
            directory: ConferenceDirectory::new(config.default_room_capacity),
            sessions: SessionRegistry::new(),
            hub: ConnectionHub::new(config.outbound_buffer),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub const fn directory(&self) -> &ConferenceDirectory {
        &self.directory
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub const fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    #[must_use]
    pub fn config(&self) -> &ConferenceConfig {
        &self.config
    }

    /// Attach a new transport connection; no presence state is created yet
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Delivery>) {
        let connection_id = ConnectionId::new();
        let rx = self.hub.attach(connection_id.clone());
        (connection_id, rx)
    }

    /// Transport-level close: leave whatever conference the connection was in
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        self.leave(connection_id);
        self.hub.detach(connection_id);
        debug!(connection_id = %connection_id, "Connection disconnected");
    }

    /// Dispatch one inbound event; failures become an `error` event to the caller
    pub fn handle_event(&self, connection_id: &ConnectionId, event: ClientEvent) {
        let event_type = event.event_type();
        EVENTS_TOTAL.with_label_values(&[event_type]).inc();

        let result = match event {
            ClientEvent::JoinConference {
                conference_id,
                room_id,
                user_data,
            } => self.join(connection_id, conference_id, room_id, user_data),
            ClientEvent::ChangeRoom {
                conference_id,
                new_room_id,
            } => self.change_room(connection_id, conference_id.as_ref(), new_room_id),
            ClientEvent::SendMessage {
                conference_id,
                room_id,
                message,
            } => self.send_message(connection_id, conference_id.as_ref(), room_id, message),
            ClientEvent::UpdateMedia {
                conference_id,
                updates,
            } => self.update_media(connection_id, conference_id.as_ref(), &updates),
            ClientEvent::RaiseHand { conference_id } => {
                self.set_hand(connection_id, conference_id.as_ref(), true)
            }
            ClientEvent::LowerHand { conference_id } => {
                self.set_hand(connection_id, conference_id.as_ref(), false)
            }
            ClientEvent::SendReaction {
                conference_id,
                reaction_type,
            } => self.send_reaction(connection_id, conference_id.as_ref(), &reaction_type),
            ClientEvent::MuteAll {
                conference_id,
                room_id,
            } => self.mute_all(connection_id, conference_id.as_ref(), room_id),
            ClientEvent::LeaveConference { conference_id } => {
                let in_conference = conference_id.as_ref().map_or(true, |hint| {
                    self.sessions
                        .lookup(connection_id)
                        .is_some_and(|s| s.conference_id == *hint)
                });
                if in_conference {
                    self.leave(connection_id);
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            match &e {
                Error::Internal(_) => error!(
                    connection_id = %connection_id,
                    event_type = event_type,
                    error = %e,
                    "Event handler failed"
                ),
                _ => debug!(
                    connection_id = %connection_id,
                    event_type = event_type,
                    error = %e,
                    "Event rejected"
                ),
            }
            self.hub
                .send_to(connection_id, ServerEvent::error(e.client_message()));
        }
    }

    /// Join a conference room, creating the conference and room on demand
    pub fn join(
        &self,
        connection_id: &ConnectionId,
        conference_id: ConferenceId,
        room_id: Option<RoomId>,
        user_data: UserData,
    ) -> Result<()> {
        if conference_id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("Conference id is required".to_string()));
        }
        let room_id = room_id
            .filter(|r| !r.as_str().trim().is_empty())
            .unwrap_or_else(RoomId::main);

        let participant_id = user_data
            .id
            .clone()
            .filter(|id| !id.as_str().trim().is_empty())
            .unwrap_or_else(ParticipantId::new);
        let name = self.display_name(&user_data.name);

        if let Some(previous) = self.sessions.lookup(connection_id) {
            // The previous membership is only torn down once the target accepts us
            if let Some(handle) = self.directory.get(&conference_id) {
                let conference = handle.lock();
                if !conference.is_closed() {
                    check_admission(&conference, &participant_id, &room_id, Some(&previous))?;
                }
            }
            debug!(connection_id = %connection_id, "Connection rejoining, leaving previous conference");
            self.leave(connection_id);
        }

        loop {
            let (handle, _) = self.directory.get_or_create(&conference_id);
            let mut conference = handle.lock();
            if conference.is_closed() {
                // Removed between lookup and lock; retry against a fresh entry
                continue;
            }

            check_admission(&conference, &participant_id, &room_id, None)?;

            let (room, room_created) =
                conference.get_or_create_room(&room_id, None, self.config.default_room_capacity);
            if room_created {
                let summary = room.summary();
                self.hub.fan_out(
                    &conference.connections(),
                    &ServerEvent::RoomCreated { room: summary },
                    Scope::Conference,
                );
            }

            let participant = Participant {
                id: participant_id.clone(),
                connection_id: connection_id.clone(),
                name: name.clone(),
                avatar: user_data.avatar.clone(),
                is_video_on: user_data.is_video_on.unwrap_or(true),
                is_audio_on: user_data.is_audio_on.unwrap_or(true),
                is_screen_sharing: false,
                is_host: conference.is_empty(),
                joined_at: Utc::now(),
                room_id: room_id.clone(),
                join_order: conference.take_join_order(),
            };
            let is_host = participant.is_host;

            conference.admit(participant.clone());
            self.sessions.register(
                connection_id.clone(),
                participant_id.clone(),
                conference_id.clone(),
                room_id.clone(),
            );

            self.hub.fan_out(
                &conference.connections(),
                &ServerEvent::UserJoined {
                    conference_id: conference_id.clone(),
                    participant: participant.clone(),
                    participants: conference.participant_list(),
                    rooms: conference.room_summaries(),
                },
                Scope::Conference,
            );
            self.announce_room_entry(&conference, participant, &room_id);

            info!(
                conference_id = %conference_id,
                room_id = %room_id,
                participant_id = %participant_id,
                connection_id = %connection_id,
                is_host = is_host,
                "Participant joined conference"
            );

            return Ok(());
        }
    }

    /// Move the caller to another room of its conference
    pub fn change_room(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        new_room_id: RoomId,
    ) -> Result<()> {
        self.with_caller(connection_id, conference_hint, |conference, caller| {
            if new_room_id.as_str().trim().is_empty() {
                return Err(Error::InvalidInput("Room id is required".to_string()));
            }
            let old_room_id = caller.room_id.clone();
            if old_room_id == new_room_id {
                return Ok(());
            }
            if conference.room(&new_room_id).is_some_and(|room| room.is_full()) {
                return Err(Error::InvalidInput("Room is full".to_string()));
            }

            if let Some(room) = conference.rooms.get_mut(&old_room_id) {
                room.participants.shift_remove(&caller.participant_id);
            }
            let old_room_removed = conference.remove_room_if_empty(&old_room_id);

            let (room, room_created) = conference.get_or_create_room(
                &new_room_id,
                None,
                self.config.default_room_capacity,
            );
            room.participants.insert(caller.participant_id.clone());
            let new_summary = room_created.then(|| room.summary());

            let participant = match conference.participants.get_mut(&caller.participant_id) {
                Some(participant) => {
                    participant.room_id = new_room_id.clone();
                    participant.clone()
                }
                None => {
                    return Err(Error::Internal(format!(
                        "participant {} vanished during room change",
                        caller.participant_id
                    )))
                }
            };
            self.sessions
                .update_room(&caller.connection_id, new_room_id.clone());

            let audience = conference.connections();
            if old_room_removed {
                self.hub.fan_out(
                    &audience,
                    &ServerEvent::RoomRemoved {
                        room_id: old_room_id.clone(),
                    },
                    Scope::Conference,
                );
            }
            if let Some(room) = new_summary {
                self.hub
                    .fan_out(&audience, &ServerEvent::RoomCreated { room }, Scope::Conference);
            }
            if !old_room_removed {
                self.hub.fan_out(
                    &conference.room_connections(&old_room_id),
                    &ServerEvent::UserLeftRoom {
                        room_id: old_room_id.clone(),
                        participant_id: caller.participant_id.clone(),
                        participants: conference.room_members(&old_room_id),
                    },
                    Scope::Room,
                );
            }
            self.announce_room_entry(conference, participant, &new_room_id);

            info!(
                conference_id = %conference.id,
                participant_id = %caller.participant_id,
                from_room = %old_room_id,
                to_room = %new_room_id,
                "Participant changed room"
            );
            Ok(())
        })
        .map(|_| ())
    }

    /// Leave the caller's conference; a second call is a no-op
    pub fn leave(&self, connection_id: &ConnectionId) -> bool {
        let Some(session) = self.sessions.lookup(connection_id) else {
            debug!(connection_id = %connection_id, "No session to tear down");
            return false;
        };

        let Some(handle) = self.directory.get(&session.conference_id) else {
            self.sessions.remove(connection_id);
            return false;
        };

        let departed = {
            let mut conference = handle.lock();
            let owns_participant = conference
                .participant(&session.participant_id)
                .is_some_and(|p| p.connection_id == *connection_id);

            if owns_participant {
                self.teardown_locked(&mut conference, &session.participant_id)
                    .is_some()
            } else {
                self.sessions.remove(connection_id);
                false
            }
        };

        if departed {
            self.directory.remove_if_empty(&session.conference_id);
        }
        departed
    }

    /// Remove a participant from a conference
    ///
    /// The participant is notified and its connection asked to close. Fails
    /// with `NotFound` when the conference or participant is unknown.
    pub fn kick(&self, conference_id: &ConferenceId, participant_id: &ParticipantId) -> Result<()> {
        let handle = self
            .directory
            .get(conference_id)
            .ok_or_else(|| Error::NotFound(format!("Conference {conference_id} not found")))?;

        let connection_id = {
            let mut conference = handle.lock();
            if conference.participant(participant_id).is_none() {
                return Err(Error::NotFound(format!(
                    "Participant {participant_id} not found"
                )));
            }

            let connection_id = self.sessions.connection_for(conference_id, participant_id);
            if let Some(connection_id) = &connection_id {
                self.hub.send_to(
                    connection_id,
                    ServerEvent::KickedFromConference {
                        conference_id: conference_id.clone(),
                        reason: KICK_REASON.to_string(),
                    },
                );
            } else {
                warn!(
                    conference_id = %conference_id,
                    participant_id = %participant_id,
                    "Kicked participant has no connection, removing record only"
                );
            }

            self.teardown_locked(&mut conference, participant_id);
            connection_id
        };

        if let Some(connection_id) = &connection_id {
            self.hub.close(connection_id);
        }
        self.directory.remove_if_empty(conference_id);

        info!(
            conference_id = %conference_id,
            participant_id = %participant_id,
            "Participant kicked"
        );
        Ok(())
    }

    /// Create an empty conference under a fresh ID
    pub fn create_conference(&self) -> ConferenceId {
        self.directory.create()
    }

    /// Create a room with explicit metadata and announce it to the conference
    pub fn create_room(&self, conference_id: &ConferenceId, options: RoomOptions) -> Result<RoomSummary> {
        let handle = self
            .directory
            .get(conference_id)
            .ok_or_else(|| Error::NotFound(format!("Conference {conference_id} not found")))?;
        let mut conference = handle.lock();
        if conference.is_closed() {
            return Err(Error::NotFound(format!("Conference {conference_id} not found")));
        }

        let mut room_id = RoomId::new();
        while conference.room(&room_id).is_some() {
            room_id = RoomId::new();
        }

        let (room, _) = conference.get_or_create_room(
            &room_id,
            Some(options),
            self.config.default_room_capacity,
        );
        let summary = room.summary();

        self.hub.fan_out(
            &conference.connections(),
            &ServerEvent::RoomCreated {
                room: summary.clone(),
            },
            Scope::Conference,
        );
        Ok(summary)
    }

    pub fn conference_snapshot(&self, conference_id: &ConferenceId) -> Result<ConferenceSnapshot> {
        let handle = self
            .directory
            .get(conference_id)
            .ok_or_else(|| Error::NotFound(format!("Conference {conference_id} not found")))?;
        let conference = handle.lock();
        if conference.is_closed() {
            return Err(Error::NotFound(format!("Conference {conference_id} not found")));
        }
        Ok(conference.snapshot())
    }

    /// Resolve the calling connection and run `f` under its conference lock
    ///
    /// Returns `Ok(None)` when the connection has no live session or names a
    /// different conference than the one it joined; such events are dropped.
    pub(crate) fn with_caller<T>(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        f: impl FnOnce(&mut Conference, &Caller) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(session) = self.sessions.lookup(connection_id) else {
            debug!(connection_id = %connection_id, "No session for connection, event dropped");
            return Ok(None);
        };

        if let Some(hint) = conference_hint {
            if *hint != session.conference_id {
                debug!(
                    connection_id = %connection_id,
                    conference_id = %hint,
                    session_conference_id = %session.conference_id,
                    "Event names a conference the connection is not in, dropped"
                );
                return Ok(None);
            }
        }

        let Some(handle) = self.directory.get(&session.conference_id) else {
            debug!(connection_id = %connection_id, "Conference already gone, event dropped");
            return Ok(None);
        };
        let mut conference = handle.lock();

        let Some(participant) = conference
            .participant(&session.participant_id)
            .filter(|p| p.connection_id == *connection_id)
        else {
            debug!(connection_id = %connection_id, "Stale session, event dropped");
            return Ok(None);
        };
        let caller = Caller {
            connection_id: connection_id.clone(),
            participant_id: participant.id.clone(),
            room_id: participant.room_id.clone(),
        };

        f(&mut *conference, &caller).map(Some)
    }

    /// Remove a participant and announce the departure; the lock must be held
    ///
    /// Returns the removed record, or `None` if it was already gone.
    pub(crate) fn teardown_locked(
        &self,
        conference: &mut Conference,
        participant_id: &ParticipantId,
    ) -> Option<Participant> {
        let participant = conference.evict(participant_id)?;
        let room_id = participant.room_id.clone();

        let owns_session = self
            .sessions
            .lookup(&participant.connection_id)
            .is_some_and(|s| s.conference_id == conference.id && s.participant_id == participant.id);
        if owns_session {
            self.sessions.remove(&participant.connection_id);
        }

        let room_removed = conference.remove_room_if_empty(&room_id);

        let new_host = if participant.is_host && !conference.is_empty() {
            elect_host(conference.participants.values()).and_then(|id| {
                let host = conference.participants.get_mut(&id)?;
                host.is_host = true;
                Some((host.id.clone(), host.name.clone()))
            })
        } else {
            None
        };

        if !room_removed {
            self.hub.fan_out(
                &conference.room_connections(&room_id),
                &ServerEvent::UserLeftRoom {
                    room_id: room_id.clone(),
                    participant_id: participant.id.clone(),
                    participants: conference.room_members(&room_id),
                },
                Scope::Room,
            );
        }

        let audience = conference.connections();
        self.hub.fan_out(
            &audience,
            &ServerEvent::UserLeft {
                participant_id: participant.id.clone(),
                name: participant.name.clone(),
                participants: conference.participant_list(),
                rooms: conference.room_summaries(),
            },
            Scope::Conference,
        );

        if room_removed {
            self.hub.fan_out(
                &audience,
                &ServerEvent::RoomRemoved {
                    room_id: room_id.clone(),
                },
                Scope::Conference,
            );
        }

        if let Some((host_id, host_name)) = new_host {
            info!(
                conference_id = %conference.id,
                participant_id = %host_id,
                "Host role transferred"
            );
            self.hub.fan_out(
                &audience,
                &ServerEvent::HostChanged {
                    participant_id: host_id,
                    name: host_name,
                },
                Scope::Conference,
            );
        }

        info!(
            conference_id = %conference.id,
            room_id = %room_id,
            participant_id = %participant.id,
            remaining = conference.participants.len(),
            "Participant left conference"
        );

        Some(participant)
    }

    /// Send `user-joined-room` with the member list and history to the room
    fn announce_room_entry(&self, conference: &Conference, participant: Participant, room_id: &RoomId) {
        let messages = conference
            .room(room_id)
            .map(|room| room.messages.clone())
            .unwrap_or_default();

        self.hub.fan_out(
            &conference.room_connections(room_id),
            &ServerEvent::UserJoinedRoom {
                room_id: room_id.clone(),
                participant,
                participants: conference.room_members(room_id),
                messages,
            },
            Scope::Room,
        );
    }

    fn display_name(&self, raw: &str) -> String {
        let name: String = raw.trim().chars().take(self.config.max_name_length).collect();
        let name = name.trim_end().to_string();
        if name.is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            name
        }
    }
}

/// Reject a join the conference cannot accept
///
/// `vacating` is the joiner's current session; its own seat does not count
/// against it when it rejoins the same conference.
fn check_admission(
    conference: &Conference,
    participant_id: &ParticipantId,
    room_id: &RoomId,
    vacating: Option<&Session>,
) -> Result<()> {
    let vacating = vacating.filter(|s| s.conference_id == conference.id);

    let is_own_seat = vacating.is_some_and(|s| s.participant_id == *participant_id);
    if conference.participant(participant_id).is_some() && !is_own_seat {
        return Err(Error::InvalidInput(
            "Participant is already in this conference".to_string(),
        ));
    }

    let frees_a_slot = vacating.is_some_and(|s| s.room_id == *room_id);
    if conference.room(room_id).is_some_and(|room| room.is_full()) && !frees_a_slot {
        return Err(Error::InvalidInput("Room is full".to_string()));
    }
    Ok(())
}
