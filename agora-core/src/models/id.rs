use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Generate a 12-character nanoid for entity IDs
#[must_use]
pub fn generate_id() -> String {
    nanoid!(12)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(generate_id())
            }

            #[must_use]
            pub const fn from_string(id: String) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Conference ID (nanoid, or caller supplied)
    ConferenceId
);

string_id!(
    /// Room ID, unique within a conference
    RoomId
);

string_id!(
    /// Participant ID (caller supplied identity or nanoid)
    ParticipantId
);

string_id!(
    /// Handle of one live transport connection
    ConnectionId
);

string_id!(
    /// Chat message ID
    MessageId
);

/// ID of the room every conference is created with
pub const MAIN_ROOM_ID: &str = "main";

impl RoomId {
    /// The permanent default room of a conference
    #[must_use]
    pub fn main() -> Self {
        Self(MAIN_ROOM_ID.to_string())
    }

    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_ROOM_ID
    }
}
