//! Wire protocol between connections and the coordinator
//!
//! Every frame is `{"event": "<kebab-case name>", "data": {...}}` with
//! camelCase payload fields. Inbound frames may omit `data` when the event
//! carries nothing; decode them with [`ClientEvent::from_json`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use agora_core::models::{
    ConferenceId, MediaUpdate, Message, Participant, ParticipantId, RoomId, RoomSummary,
};

use crate::error::Error;

/// Identity and initial media state supplied on join
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub id: Option<ParticipantId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_video_on: Option<bool>,
    #[serde(default)]
    pub is_audio_on: Option<bool>,
}

/// Events sent by a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinConference {
        conference_id: ConferenceId,
        #[serde(default)]
        room_id: Option<RoomId>,
        user_data: UserData,
    },
    ChangeRoom {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
        new_room_id: RoomId,
    },
    SendMessage {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
        #[serde(default)]
        room_id: Option<RoomId>,
        message: String,
    },
    UpdateMedia {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
        updates: MediaUpdate,
    },
    RaiseHand {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
    },
    LowerHand {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
    },
    SendReaction {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
        reaction_type: String,
    },
    MuteAll {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    LeaveConference {
        #[serde(default)]
        conference_id: Option<ConferenceId>,
    },
}

/// Inbound envelope before the payload is matched to its event
#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl ClientEvent {
    /// Decode one text frame, treating a missing or null `data` as `{}`
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        let data = match frame.data {
            Some(serde_json::Value::Null) | None => serde_json::Value::Object(serde_json::Map::new()),
            Some(data) => data,
        };
        serde_json::from_value(serde_json::json!({ "event": frame.event, "data": data }))
    }

    /// Wire name of the event
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::JoinConference { .. } => "join-conference",
            Self::ChangeRoom { .. } => "change-room",
            Self::SendMessage { .. } => "send-message",
            Self::UpdateMedia { .. } => "update-media",
            Self::RaiseHand { .. } => "raise-hand",
            Self::LowerHand { .. } => "lower-hand",
            Self::SendReaction { .. } => "send-reaction",
            Self::MuteAll { .. } => "mute-all",
            Self::LeaveConference { .. } => "leave-conference",
        }
    }
}

/// Reactions a participant may broadcast to their room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReactionKind {
    ThumbsUp,
    ThumbsDown,
    Heart,
    Laugh,
    Clap,
    Surprised,
    Celebrate,
}

impl ReactionKind {
    pub const ALL: [Self; 7] = [
        Self::ThumbsUp,
        Self::ThumbsDown,
        Self::Heart,
        Self::Laugh,
        Self::Clap,
        Self::Surprised,
        Self::Celebrate,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThumbsUp => "thumbs-up",
            Self::ThumbsDown => "thumbs-down",
            Self::Heart => "heart",
            Self::Laugh => "laugh",
            Self::Clap => "clap",
            Self::Surprised => "surprised",
            Self::Celebrate => "celebrate",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid reaction type: {s}")))
    }
}

/// Events delivered to connections
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Someone joined the conference (sent to the whole conference)
    UserJoined {
        conference_id: ConferenceId,
        participant: Participant,
        participants: Vec<Participant>,
        rooms: Vec<RoomSummary>,
    },

    /// Someone entered a room; carries the member list and chat history
    UserJoinedRoom {
        room_id: RoomId,
        participant: Participant,
        participants: Vec<Participant>,
        messages: Vec<Message>,
    },

    UserLeft {
        participant_id: ParticipantId,
        name: String,
        participants: Vec<Participant>,
        rooms: Vec<RoomSummary>,
    },

    UserLeftRoom {
        room_id: RoomId,
        participant_id: ParticipantId,
        participants: Vec<Participant>,
    },

    RoomCreated {
        room: RoomSummary,
    },

    RoomRemoved {
        room_id: RoomId,
    },

    HostChanged {
        participant_id: ParticipantId,
        name: String,
    },

    NewMessage {
        message: Message,
    },

    UserUpdated {
        participant_id: ParticipantId,
        updates: MediaUpdate,
    },

    HandRaised {
        participant_id: ParticipantId,
        name: String,
        room_id: RoomId,
    },

    HandLowered {
        participant_id: ParticipantId,
        name: String,
        room_id: RoomId,
    },

    Reaction {
        participant_id: ParticipantId,
        name: String,
        reaction_type: ReactionKind,
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },

    AllParticipantsMuted {
        room_id: RoomId,
        muted_by: ParticipantId,
        participant_ids: Vec<ParticipantId>,
    },

    /// Sent only to a participant whose microphone the host turned off
    ForcedMute {
        room_id: RoomId,
        muted_by: ParticipantId,
    },

    KickedFromConference {
        conference_id: ConferenceId,
        reason: String,
    },

    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of the event
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "user-joined",
            Self::UserJoinedRoom { .. } => "user-joined-room",
            Self::UserLeft { .. } => "user-left",
            Self::UserLeftRoom { .. } => "user-left-room",
            Self::RoomCreated { .. } => "room-created",
            Self::RoomRemoved { .. } => "room-removed",
            Self::HostChanged { .. } => "host-changed",
            Self::NewMessage { .. } => "new-message",
            Self::UserUpdated { .. } => "user-updated",
            Self::HandRaised { .. } => "hand-raised",
            Self::HandLowered { .. } => "hand-lowered",
            Self::Reaction { .. } => "reaction",
            Self::AllParticipantsMuted { .. } => "all-participants-muted",
            Self::ForcedMute { .. } => "forced-mute",
            Self::KickedFromConference { .. } => "kicked-from-conference",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
