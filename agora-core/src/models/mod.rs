pub mod id;
pub mod message;
pub mod participant;
pub mod room;

pub use id::{
    generate_id, ConferenceId, ConnectionId, MessageId, ParticipantId, RoomId, MAIN_ROOM_ID,
};
pub use message::Message;
pub use participant::{MediaUpdate, Participant, SenderInfo};
pub use room::{RoomOptions, RoomSummary};
