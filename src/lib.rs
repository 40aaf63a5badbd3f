//! Media subscription admission control for many-to-many rooms
//!
//! Clients in large real-time AV rooms cannot decode every published track at
//! once. This crate decides, continuously, which remote publishers the local
//! client should be subscribed to: privileged participants first, then active
//! speakers, then whoever is nearest in the scene, bounded by per-kind slot
//! limits and optional distance cutoffs.
//!
//! # Architecture
//!
//! ```text
//!                          RoomSession::connect()
//!                                  │
//!                                  ▼
//!    SessionHandle ─commands─► session task ◄─events─ MediaTransport glue
//!                                  │
//!             ┌────────────────────┼────────────────────┐
//!             ▼                    ▼                    ▼
//!      AdmissionController    VoiceDetector        MediaRequests
//!      (rank + diff per       (local mic ──►       (futures parked
//!       tick, slot-bounded)    VAD:/NOVAD:          until a track
//!             │                 side-channel)       arrives)
//!             ▼
//!      TickPlan ──► subscribe / unsubscribe / play / stop
//! ```
//!
//! The session task is the sole owner of all room state; transport calls are
//! spawned and their outcomes fed back through a channel, so reconciliation
//! never blocks on the network.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use roomsub::session::{RoomSession, SessionConfig};
//! use roomsub::types::{MediaKind, ParticipantId};
//! # use roomsub::transport::{MediaTransport, PositionSource, RoleSource, LevelSource};
//! # async fn run<T, P, R, L>(transport: Arc<T>, positions: P, roles: R, levels: L)
//! # -> roomsub::error::Result<()>
//! # where T: MediaTransport, P: PositionSource, R: RoleSource, L: LevelSource {
//! # let (events_tx, _events_rx) = tokio::sync::broadcast::channel(16);
//! # let (signal_tx, _) = tokio::sync::mpsc::channel(16);
//! # let (_, signal_rx) = tokio::sync::mpsc::channel(16);
//! # let (_, transport_rx) = tokio::sync::mpsc::channel(16);
//! let config = SessionConfig::new("lobby", ParticipantId::new("me"));
//! let session = RoomSession::connect(
//!     config, transport, positions, roles, levels,
//!     events_tx, signal_tx, signal_rx, transport_rx,
//! ).await?;
//!
//! let stream = session
//!     .request_media_stream(ParticipantId::new("alice"), MediaKind::Audio)
//!     .await?;
//! # Ok(()) }
//! ```

pub mod admission;
pub mod alloc;
pub mod error;
pub mod requests;
pub mod session;
pub mod transport;
pub mod types;
pub mod vad;

pub use admission::{AdmissionConfig, AdmissionController, TickPlan};
pub use alloc::HostAllocator;
pub use error::{Error, Result};
pub use requests::MediaRequests;
pub use session::{ChannelConfig, RoomSession, SessionConfig, SessionEvent, SessionHandle};
pub use transport::{
    LevelSource, MediaTransport, PositionSource, RoleSource, SignalMessage, TransportError,
    TransportEvent,
};
pub use types::{MediaKind, MediaStream, MediaTrack, ParticipantId, Position, TrackHandle};
pub use vad::{PrioritySignals, VadConfig, VadSignal, VoiceDetector};
