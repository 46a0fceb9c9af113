use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ConnectionId, ParticipantId, RoomId};

/// A connected identity's presence record within one conference
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(skip)]
    pub connection_id: ConnectionId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_video_on: bool,
    pub is_audio_on: bool,
    pub is_screen_sharing: bool,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
    /// Room the participant currently occupies
    pub room_id: RoomId,
    /// Position in the conference join sequence, used for host failover
    #[serde(skip)]
    pub join_order: u64,
}

impl Participant {
    /// Merge a partial media patch into this participant
    pub fn apply_media(&mut self, update: &MediaUpdate) {
        if let Some(on) = update.is_video_on {
            self.is_video_on = on;
        }
        if let Some(on) = update.is_audio_on {
            self.is_audio_on = on;
        }
        if let Some(on) = update.is_screen_sharing {
            self.is_screen_sharing = on;
        }
    }

    #[must_use]
    pub fn sender_info(&self) -> SenderInfo {
        SenderInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Partial media-state patch sent by `update-media`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_video_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_audio_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_screen_sharing: Option<bool>,
}

impl MediaUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_video_on.is_none() && self.is_audio_on.is_none() && self.is_screen_sharing.is_none()
    }
}

/// Public identity of a message author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub id: ParticipantId,
    pub name: String,
    pub avatar: Option<String>,
}
