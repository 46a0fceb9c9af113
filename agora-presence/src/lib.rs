pub mod conference;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod host;
pub mod hub;
pub mod moderation;
pub mod room;
pub mod session;

pub use conference::{Conference, ConferenceSnapshot};
pub use coordinator::Coordinator;
pub use directory::{ConferenceDirectory, ConferenceHandle};
pub use error::{Error, Result};
pub use events::{ClientEvent, ReactionKind, ServerEvent, UserData};
pub use host::elect_host;
pub use hub::{ConnectionHub, Delivery, Scope};
pub use room::Room;
pub use session::{Session, SessionRegistry};
