//! Chat, media state, hands, reactions and host moderation

use chrono::Utc;
use tracing::{debug, info};

use agora_core::models::{ConferenceId, ConnectionId, MediaUpdate, Message, RoomId};

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::events::{ReactionKind, ServerEvent};
use crate::hub::Scope;

impl Coordinator {
    /// Append a chat message to a room and broadcast it to that room
    pub fn send_message(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        room_id: Option<RoomId>,
        content: String,
    ) -> Result<()> {
        let max_length = self.config().max_message_length;

        self.with_caller(connection_id, conference_hint, |conference, caller| {
            if content.trim().is_empty() {
                return Err(Error::InvalidInput("Message cannot be empty".to_string()));
            }
            if content.chars().count() > max_length {
                return Err(Error::InvalidInput(format!(
                    "Message exceeds {max_length} characters"
                )));
            }

            let room_id = room_id.unwrap_or_else(|| caller.room_id.clone());
            let sender = conference
                .participant(&caller.participant_id)
                .map(|p| p.sender_info())
                .ok_or_else(|| Error::Internal("caller record missing".to_string()))?;
            let room = conference
                .rooms
                .get_mut(&room_id)
                .ok_or_else(|| Error::NotFound(format!("Room {room_id} not found")))?;

            let message = Message::new(content, sender, room_id.clone());
            room.messages.push(message.clone());

            debug!(
                conference_id = %conference.id,
                room_id = %room_id,
                participant_id = %caller.participant_id,
                message_id = %message.id,
                "Message posted"
            );

            self.hub().fan_out(
                &conference.room_connections(&room_id),
                &ServerEvent::NewMessage { message },
                Scope::Room,
            );
            Ok(())
        })
        .map(|_| ())
    }

    /// Merge a media-state patch into the caller and tell the conference
    pub fn update_media(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        updates: &MediaUpdate,
    ) -> Result<()> {
        self.with_caller(connection_id, conference_hint, |conference, caller| {
            if updates.is_empty() {
                return Ok(());
            }

            let participant = conference
                .participants
                .get_mut(&caller.participant_id)
                .ok_or_else(|| Error::Internal("caller record missing".to_string()))?;
            participant.apply_media(updates);

            self.hub().fan_out(
                &conference.connections(),
                &ServerEvent::UserUpdated {
                    participant_id: caller.participant_id.clone(),
                    updates: updates.clone(),
                },
                Scope::Conference,
            );
            Ok(())
        })
        .map(|_| ())
    }

    /// Broadcast a raised or lowered hand to the caller's room; nothing is stored
    pub fn set_hand(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        raised: bool,
    ) -> Result<()> {
        self.with_caller(connection_id, conference_hint, |conference, caller| {
            let name = conference
                .participant(&caller.participant_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();

            let event = if raised {
                ServerEvent::HandRaised {
                    participant_id: caller.participant_id.clone(),
                    name,
                    room_id: caller.room_id.clone(),
                }
            } else {
                ServerEvent::HandLowered {
                    participant_id: caller.participant_id.clone(),
                    name,
                    room_id: caller.room_id.clone(),
                }
            };

            self.hub()
                .fan_out(&conference.room_connections(&caller.room_id), &event, Scope::Room);
            Ok(())
        })
        .map(|_| ())
    }

    /// Broadcast a reaction from the fixed set to the caller's room
    pub fn send_reaction(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        reaction_type: &str,
    ) -> Result<()> {
        self.with_caller(connection_id, conference_hint, |conference, caller| {
            let reaction_type: ReactionKind = reaction_type.parse()?;
            let name = conference
                .participant(&caller.participant_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();

            self.hub().fan_out(
                &conference.room_connections(&caller.room_id),
                &ServerEvent::Reaction {
                    participant_id: caller.participant_id.clone(),
                    name,
                    reaction_type,
                    room_id: caller.room_id.clone(),
                    timestamp: Utc::now(),
                },
                Scope::Room,
            );
            Ok(())
        })
        .map(|_| ())
    }

    /// Host-only: turn off every other microphone in a room
    pub fn mute_all(
        &self,
        connection_id: &ConnectionId,
        conference_hint: Option<&ConferenceId>,
        room_id: Option<RoomId>,
    ) -> Result<()> {
        self.with_caller(connection_id, conference_hint, |conference, caller| {
            let is_host = conference
                .participant(&caller.participant_id)
                .is_some_and(|p| p.is_host);
            if !is_host {
                return Err(Error::Unauthorized(
                    "Only the host can mute all participants".to_string(),
                ));
            }

            let room_id = room_id.unwrap_or_else(|| caller.room_id.clone());
            let targets: Vec<_> = conference
                .room(&room_id)
                .ok_or_else(|| Error::NotFound(format!("Room {room_id} not found")))?
                .participants
                .iter()
                .filter(|id| **id != caller.participant_id)
                .cloned()
                .collect();

            for target in &targets {
                if let Some(participant) = conference.participants.get_mut(target) {
                    participant.is_audio_on = false;
                    self.hub().send_to(
                        &participant.connection_id,
                        ServerEvent::ForcedMute {
                            room_id: room_id.clone(),
                            muted_by: caller.participant_id.clone(),
                        },
                    );
                }
            }

            self.hub().fan_out(
                &conference.room_connections(&room_id),
                &ServerEvent::AllParticipantsMuted {
                    room_id: room_id.clone(),
                    muted_by: caller.participant_id.clone(),
                    participant_ids: targets.clone(),
                },
                Scope::Room,
            );

            info!(
                conference_id = %conference.id,
                room_id = %room_id,
                participant_id = %caller.participant_id,
                muted = targets.len(),
                "Host muted room"
            );
            Ok(())
        })
        .map(|_| ())
    }
}
