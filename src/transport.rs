//! External capability interfaces
//!
//! Everything the session needs from its host environment arrives through the
//! traits in this module: the media transport itself, the scene position
//! source, the presence/roles source, and the mic level tap. The session owns
//! no knowledge of how any of these are populated.

use std::future::Future;

use crate::types::{MediaKind, MediaTrack, ParticipantId, Position};

/// Error reported by a transport operation
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The transport rejected the operation
    Rejected(String),
    /// The underlying connection is gone
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Rejected(reason) => write!(f, "Rejected: {}", reason),
            TransportError::Closed => write!(f, "Transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Media transport operations consumed by the session
///
/// Async methods return `Send` futures so reconciliation work can be spawned
/// off the session loop; a superseded call is never cancelled, the next
/// admission tick corrects the outcome instead.
pub trait MediaTransport: Send + Sync + 'static {
    /// Join a room under the given identity
    fn join(
        &self,
        room: &str,
        identity: &ParticipantId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish a local track into the given channel
    fn publish(
        &self,
        channel: usize,
        track: MediaTrack,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Unpublish all local tracks
    fn unpublish(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Subscribe to a remote publisher's track of the given kind
    fn subscribe(
        &self,
        participant: ParticipantId,
        kind: MediaKind,
    ) -> impl Future<Output = Result<MediaTrack, TransportError>> + Send;

    /// Unsubscribe from a remote publisher's track of the given kind
    fn unsubscribe(
        &self,
        participant: ParticipantId,
        kind: MediaKind,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Elevate the local role on a channel so publishing is permitted
    fn set_host_role(
        &self,
        channel: usize,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start raw local playback of a subscribed audio track
    fn play_audio(&self, participant: &ParticipantId);

    /// Stop raw local playback for a participant
    fn stop_audio(&self, participant: &ParticipantId);

    /// Enable or disable the published mic track
    fn set_mic_enabled(&self, enabled: bool);
}

/// Per-participant 3D position lookup
pub trait PositionSource: Send + Sync + 'static {
    /// Position of a remote participant, if resolvable right now
    fn position_of(&self, participant: &ParticipantId) -> Option<Position>;

    /// Position of the local participant
    fn self_position(&self) -> Option<Position>;
}

/// Per-participant privilege lookup from the presence/roles feed
pub trait RoleSource: Send + Sync + 'static {
    /// Whether the participant is currently flagged as privileged
    fn is_privileged(&self, participant: &ParticipantId) -> bool;
}

/// Current mic input level from the capture pipeline
pub trait LevelSource: Send + 'static {
    /// Level on a 0..=100 scale, or `None` when capture is unavailable
    fn level(&mut self) -> Option<u32>;
}

/// Events delivered from the transport to the session loop
///
/// Integration glue forwards SDK callbacks into an mpsc channel carrying
/// these; every handler runs on the single session task.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A participant joined the room
    UserJoined { participant: ParticipantId },
    /// A participant started publishing a track of `kind` on `channel`
    UserPublished {
        participant: ParticipantId,
        kind: MediaKind,
        channel: usize,
    },
    /// A participant stopped publishing a track of `kind`
    UserUnpublished {
        participant: ParticipantId,
        kind: MediaKind,
    },
    /// A participant left the room
    UserLeft { participant: ParticipantId },
}

/// Inbound message from the signaling side-channel
#[derive(Debug, Clone)]
pub struct SignalMessage {
    /// Sending participant
    pub sender: ParticipantId,
    /// Raw message text
    pub text: String,
}
