//! Core identity and media types
//!
//! This module defines the participant identifier, the audio/video kind
//! discriminator, and the track/stream wrappers used at the transport boundary.

/// Unique identifier for a room participant
///
/// Opaque and stable for the duration of one room membership session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    /// Both kinds, in the order the admission tick processes them
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    /// String form used in logs and wire-adjacent contexts
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-assigned handle for a raw track
///
/// The handle is only meaningful to the transport that issued it; this crate
/// carries it through to playable streams without interpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub u64);

/// A live published track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    /// Publishing participant
    pub participant: ParticipantId,
    /// Audio or video
    pub kind: MediaKind,
    /// Raw track handle from the transport
    pub handle: TrackHandle,
}

impl MediaTrack {
    /// Create a new track
    pub fn new(participant: ParticipantId, kind: MediaKind, handle: TrackHandle) -> Self {
        Self {
            participant,
            kind,
            handle,
        }
    }
}

/// A playable stream handed to consumers
///
/// Wraps one or more tracks, mirroring the platform notion of a media stream
/// built from raw tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// Tracks backing this stream
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Create a stream from a single track
    pub fn from_track(track: MediaTrack) -> Self {
        Self {
            tracks: vec![track],
        }
    }

    /// Create a stream from multiple tracks
    pub fn from_tracks(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    /// Get the first track of the given kind, if present
    pub fn track(&self, kind: MediaKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

/// 3D position in scene coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    /// Create a new position
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
