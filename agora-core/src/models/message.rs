use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{MessageId, RoomId};
use super::participant::SenderInfo;

/// A chat message, append-only within its room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: SenderInfo,
    pub timestamp: DateTime<Utc>,
    pub room_id: RoomId,
}

impl Message {
    #[must_use]
    pub fn new(content: String, sender: SenderInfo, room_id: RoomId) -> Self {
        Self {
            id: MessageId::new(),
            content,
            sender,
            timestamp: Utc::now(),
            room_id,
        }
    }
}
