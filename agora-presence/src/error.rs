//! Error types for the presence coordinator

use thiserror::Error;

/// Failures a handler can report back to its caller
///
/// Events from connections without a session are not errors; they are dropped
/// before any of these can be produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Text carried by the outbound `error` event
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::InvalidInput(msg) => msg.clone(),
            Self::Internal(_) => "Internal error".to_string(),
        }
    }
}

/// Result type for presence operations
pub type Result<T> = std::result::Result<T, Error>;
