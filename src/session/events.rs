//! Outward session events

use crate::types::{MediaKind, ParticipantId};

/// Events emitted to session consumers
///
/// Delivered over a `tokio::sync::broadcast` channel; slow consumers may
/// observe lag, never blockage of the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The room was joined successfully
    Connected,
    /// Joining the room failed; the session is unusable
    ConnectionErrorFatal,
    /// A participant's stream of the given kind changed
    StreamUpdated {
        participant: ParticipantId,
        kind: MediaKind,
    },
    /// The local mic was enabled or disabled
    MicStateChanged { enabled: bool },
}
