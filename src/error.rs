//! Crate error types
//!
//! Only join/connect failures are fatal for a session; everything else is
//! contained where it happens and surfaces as a log line plus local rollback.

use crate::transport::TransportError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session-level operations
#[derive(Debug, Clone)]
pub enum Error {
    /// Joining the room failed; the session never became usable
    Join(TransportError),
    /// A transport operation was rejected
    Transport(TransportError),
    /// Every publish channel is at capacity
    ChannelsExhausted,
    /// The session has been torn down
    SessionClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Join(e) => write!(f, "Join failed: {}", e),
            Error::Transport(e) => write!(f, "Transport operation failed: {}", e),
            Error::ChannelsExhausted => write!(f, "No publish channel below capacity"),
            Error::SessionClosed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}
