//! Room session
//!
//! One session = one room membership. All shared state (publisher maps,
//! subscription maps, priority signals, pending requests) lives inside a
//! single task driven by two periodic timers and the event/command channels:
//!
//! ```text
//!   SessionHandle ──commands──┐
//!   transport events ─────────┤
//!   signal side-channel ──────┼──► session task ──► subscribe/unsubscribe
//!   admission timer ──────────┤    (sole owner          (spawned, report
//!   VAD sample timer ─────────┘     of all maps)         outcomes back)
//! ```
//!
//! Handlers are short and non-blocking; long-running transport calls are
//! spawned and their outcomes re-enter the loop through an mpsc channel, so
//! no locking is needed anywhere.

pub mod config;
pub mod events;

pub use config::{ChannelConfig, SessionConfig};
pub use events::SessionEvent;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::admission::AdmissionController;
use crate::alloc::HostAllocator;
use crate::error::{Error, Result};
use crate::requests::MediaRequests;
use crate::transport::{
    LevelSource, MediaTransport, PositionSource, RoleSource, SignalMessage, TransportError,
    TransportEvent,
};
use crate::types::{MediaKind, MediaStream, MediaTrack, ParticipantId};
use crate::vad::{PrioritySignals, VadSignal, VadTransition, VoiceDetector};

const COMMAND_CAPACITY: usize = 64;
const OUTCOME_CAPACITY: usize = 256;

/// Reply to a media stream request
enum StreamReply {
    /// The track was already known
    Ready(Option<MediaStream>),
    /// Parked until the track arrives or the participant departs
    Pending(oneshot::Receiver<Option<MediaStream>>),
}

/// Commands from handles into the session task
enum Command {
    RequestStream {
        participant: ParticipantId,
        kind: MediaKind,
        reply: oneshot::Sender<StreamReply>,
    },
    SetLocalStream {
        stream: Option<MediaStream>,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMicEnabled {
        enabled: bool,
    },
    ToggleMic,
    IsMicEnabled {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Completion of a spawned transport call
enum Outcome {
    Subscribed {
        participant: ParticipantId,
        kind: MediaKind,
        result: std::result::Result<MediaTrack, TransportError>,
    },
    Unsubscribed {
        participant: ParticipantId,
        kind: MediaKind,
        result: std::result::Result<(), TransportError>,
    },
    /// Role elevation succeeded; the publish channel is now sticky
    ChannelAssigned { channel: usize },
}

/// Entry point for joining a room
pub struct RoomSession;

impl RoomSession {
    /// Join a room and spawn the session task
    ///
    /// A join failure is fatal: `ConnectionErrorFatal` is emitted and the
    /// error returned; no retry is attempted here. The caller creates the
    /// `events` broadcast channel, so a receiver subscribed before this call
    /// observes the connection lifecycle. Integration glue forwards SDK
    /// callbacks into `transport_rx` and side-channel messages into
    /// `signal_rx`; outbound signals leave through `signal_tx`.
    pub async fn connect<T, P, R, L>(
        config: SessionConfig,
        transport: Arc<T>,
        positions: P,
        roles: R,
        levels: L,
        events: broadcast::Sender<SessionEvent>,
        signal_tx: mpsc::Sender<String>,
        signal_rx: mpsc::Receiver<SignalMessage>,
        transport_rx: mpsc::Receiver<TransportEvent>,
    ) -> Result<SessionHandle>
    where
        T: MediaTransport,
        P: PositionSource,
        R: RoleSource,
        L: LevelSource,
    {
        if let Err(e) = transport.join(&config.room, &config.identity).await {
            tracing::error!(room = %config.room, error = %e, "Join failed");
            let _ = events.send(SessionEvent::ConnectionErrorFatal);
            return Err(Error::Join(e));
        }

        tracing::info!(room = %config.room, identity = %config.identity, "Joined room");
        let _ = events.send(SessionEvent::Connected);

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CAPACITY);

        let task = SessionTask {
            controller: AdmissionController::new(config.admission.clone()),
            signals: PrioritySignals::new(config.admission.audio_slots),
            detector: VoiceDetector::new(config.vad.clone()),
            requests: MediaRequests::new(),
            allocator: HostAllocator::new(config.channels.capacity),
            channel_members: vec![HashSet::new(); config.channels.count],
            remote_tracks: HashMap::new(),
            local_audio: None,
            local_video: None,
            mic_enabled: false,
            last_vad_sent: None,
            config,
            transport,
            positions,
            roles,
            levels,
            events: events.clone(),
            signal_tx,
            signal_rx,
            transport_rx,
            cmd_rx,
            outcome_tx,
            outcome_rx,
        };
        tokio::spawn(task.run());

        Ok(SessionHandle { cmd_tx, events })
    }
}

/// Clonable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Get a stream for a participant's media of the given kind
    ///
    /// Resolves immediately when the track is already known; otherwise waits
    /// until it arrives. `Ok(None)` means the participant departed without
    /// the track ever arriving, which is a legitimate outcome.
    pub async fn request_media_stream(
        &self,
        participant: ParticipantId,
        kind: MediaKind,
    ) -> Result<Option<MediaStream>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RequestStream {
            participant,
            kind,
            reply,
        })
        .await?;

        match rx.await.map_err(|_| Error::SessionClosed)? {
            StreamReply::Ready(stream) => Ok(stream),
            StreamReply::Pending(parked) => parked.await.map_err(|_| Error::SessionClosed),
        }
    }

    /// Replace the local media stream, republishing its tracks
    pub async fn set_local_media_stream(&self, stream: Option<MediaStream>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetLocalStream { stream, reply }).await?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Enable or disable the mic
    pub async fn set_mic_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetMicEnabled { enabled }).await
    }

    /// Flip the mic state
    pub async fn toggle_mic(&self) -> Result<()> {
        self.send(Command::ToggleMic).await
    }

    /// Whether the mic is currently enabled
    pub async fn is_mic_enabled(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsMicEnabled { reply }).await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Subscribe to session events
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Tear the session down
    ///
    /// Stops both timers and rejects every outstanding media request. Does
    /// not wait for in-flight transport calls to settle.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }
}

/// The session task: sole owner of all per-room state
struct SessionTask<T, P, R, L> {
    config: SessionConfig,
    transport: Arc<T>,
    positions: P,
    roles: R,
    levels: L,

    controller: AdmissionController,
    signals: PrioritySignals,
    detector: VoiceDetector,
    requests: MediaRequests,
    allocator: HostAllocator,

    /// Participants publishing at least one kind, per channel
    channel_members: Vec<HashSet<ParticipantId>>,
    /// Live remote tracks by pair
    remote_tracks: HashMap<(ParticipantId, MediaKind), MediaTrack>,
    local_audio: Option<MediaTrack>,
    local_video: Option<MediaTrack>,
    mic_enabled: bool,
    last_vad_sent: Option<Instant>,

    events: broadcast::Sender<SessionEvent>,
    signal_tx: mpsc::Sender<String>,
    signal_rx: mpsc::Receiver<SignalMessage>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    outcome_tx: mpsc::Sender<Outcome>,
    outcome_rx: mpsc::Receiver<Outcome>,
}

impl<T, P, R, L> SessionTask<T, P, R, L>
where
    T: MediaTransport,
    P: PositionSource,
    R: RoleSource,
    L: LevelSource,
{
    async fn run(mut self) {
        let mut admission = tokio::time::interval(self.config.admission.tick_period);
        admission.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut vad = tokio::time::interval(self.config.vad.sample_period);
        vad.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = admission.tick() => self.admission_tick(),
                _ = vad.tick() => self.vad_tick(),
                Some(event) = self.transport_rx.recv() => self.on_transport_event(event),
                Some(message) = self.signal_rx.recv() => self.on_signal(message),
                Some(outcome) = self.outcome_rx.recv() => self.on_outcome(outcome),
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
        }

        tracing::info!(room = %self.config.room, "Session closed");
        // Dropping self drops the request registry, rejecting every
        // still-parked future.
    }

    /// One admission tick: rank, diff, and hand the plan off
    fn admission_tick(&mut self) {
        let started = std::time::Instant::now();
        let plan = self
            .controller
            .tick(&self.positions, &self.roles, &self.signals);
        let elapsed = started.elapsed();
        if elapsed > self.config.admission.tick_period / 2 {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.config.admission.tick_period.as_millis() as u64,
                "Admission tick ran long"
            );
        }

        if plan.is_empty() {
            return;
        }
        tracing::debug!(
            subscribes = plan.subscribe.len(),
            unsubscribes = plan.unsubscribe.len(),
            "Reconciling subscriptions"
        );

        for (participant, kind) in plan.unsubscribe {
            self.remote_tracks.remove(&(participant.clone(), kind));
            let transport = Arc::clone(&self.transport);
            let outcomes = self.outcome_tx.clone();
            tokio::spawn(async move {
                let result = transport.unsubscribe(participant.clone(), kind).await;
                let _ = outcomes
                    .send(Outcome::Unsubscribed {
                        participant,
                        kind,
                        result,
                    })
                    .await;
            });
        }

        for (participant, kind) in plan.subscribe {
            let transport = Arc::clone(&self.transport);
            let outcomes = self.outcome_tx.clone();
            tokio::spawn(async move {
                let result = transport.subscribe(participant.clone(), kind).await;
                let _ = outcomes
                    .send(Outcome::Subscribed {
                        participant,
                        kind,
                        result,
                    })
                    .await;
            });
        }

        for participant in plan.stop {
            self.transport.stop_audio(&participant);
        }
        for participant in plan.play {
            self.transport.play_audio(&participant);
        }
    }

    /// One VAD sample: classify and signal peers
    fn vad_tick(&mut self) {
        if !self.mic_enabled || self.local_audio.is_none() {
            return;
        }
        let Some(level) = self.levels.level() else {
            return;
        };

        let identity = self.config.identity.clone();
        match self.detector.sample(level) {
            Some(VadTransition::Started) => {
                self.send_signal(VadSignal::Speaking(identity));
                self.last_vad_sent = Some(Instant::now());
            }
            Some(VadTransition::Stopped) => {
                // Stop signals are never throttled
                self.send_signal(VadSignal::Silent(identity));
            }
            None => {
                let due = self
                    .last_vad_sent
                    .map_or(true, |sent| sent.elapsed() >= self.config.vad.resend_interval);
                if self.detector.is_speaking() && due {
                    self.send_signal(VadSignal::Speaking(identity));
                    self.last_vad_sent = Some(Instant::now());
                }
            }
        }
    }

    fn send_signal(&self, signal: VadSignal) {
        if let Err(e) = self.signal_tx.try_send(signal.encode()) {
            tracing::warn!(error = %e, "Signal channel full, VAD signal dropped");
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::UserJoined { participant } => {
                tracing::info!(participant = %participant, "User joined");
            }
            TransportEvent::UserPublished {
                participant,
                kind,
                channel,
            } => {
                if participant == self.config.identity {
                    return;
                }
                self.controller.on_published(&participant, kind, channel);
                if let Some(members) = self.channel_members.get_mut(channel) {
                    members.insert(participant);
                } else {
                    tracing::warn!(channel = channel, "Publish event for unknown channel");
                }
            }
            TransportEvent::UserUnpublished { participant, kind } => {
                if self.controller.on_unpublished(&participant, kind) {
                    self.transport.stop_audio(&participant);
                }
                self.remote_tracks.remove(&(participant.clone(), kind));
                self.requests.close_participant(&participant);
                self.refresh_channel_membership(&participant);
            }
            TransportEvent::UserLeft { participant } => {
                tracing::info!(participant = %participant, "User left");
                if self.controller.on_left(&participant) {
                    self.transport.stop_audio(&participant);
                }
                self.signals.on_left(&participant);
                self.requests.close_participant(&participant);
                for kind in MediaKind::ALL {
                    self.remote_tracks.remove(&(participant.clone(), kind));
                }
                for members in &mut self.channel_members {
                    members.remove(&participant);
                }
            }
        }
    }

    fn on_signal(&mut self, message: SignalMessage) {
        let Some(signal) = VadSignal::parse(&message.text) else {
            return;
        };
        let participant = signal.participant();
        if *participant == self.config.identity {
            return;
        }

        match &signal {
            VadSignal::Speaking(id) => self.signals.on_speaking(id),
            VadSignal::Silent(id) => self.signals.on_silent(id),
        }
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Subscribed {
                participant,
                kind,
                result: Ok(track),
            } => {
                self.controller.complete_subscribe(&participant, kind, true);
                if self.controller.subscription(&participant, kind).is_some() {
                    self.remote_tracks
                        .insert((participant.clone(), kind), track.clone());
                }
                self.requests.resolve(track);
                let _ = self.events.send(SessionEvent::StreamUpdated { participant, kind });
            }
            Outcome::Subscribed {
                participant,
                kind,
                result: Err(e),
            } => {
                tracing::warn!(participant = %participant, kind = %kind, error = %e, "Subscribe failed");
                self.controller.complete_subscribe(&participant, kind, false);
            }
            Outcome::Unsubscribed {
                participant,
                kind,
                result,
            } => {
                // Bookkeeping was already dropped optimistically; a failure
                // only means the transport disagreed about a stream we no
                // longer want.
                if let Err(e) = result {
                    tracing::warn!(participant = %participant, kind = %kind, error = %e, "Unsubscribe failed");
                } else {
                    tracing::debug!(participant = %participant, kind = %kind, "Unsubscribed");
                }
            }
            Outcome::ChannelAssigned { channel } => {
                self.allocator.commit(channel);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::RequestStream {
                participant,
                kind,
                reply,
            } => {
                let _ = reply.send(self.stream_reply(participant, kind));
            }
            Command::SetLocalStream { stream, reply } => {
                self.set_local_stream(stream, reply);
            }
            Command::SetMicEnabled { enabled } => self.set_mic(enabled),
            Command::ToggleMic => self.set_mic(!self.mic_enabled),
            Command::IsMicEnabled { reply } => {
                let _ = reply.send(self.mic_enabled);
            }
            // Shutdown breaks the loop before reaching here
            Command::Shutdown => {}
        }
    }

    fn stream_reply(&mut self, participant: ParticipantId, kind: MediaKind) -> StreamReply {
        let known = if participant == self.config.identity {
            match kind {
                MediaKind::Audio => self.local_audio.clone(),
                MediaKind::Video => self.local_video.clone(),
            }
        } else {
            self.remote_tracks.get(&(participant.clone(), kind)).cloned()
        };

        if kind == MediaKind::Audio && participant != self.config.identity {
            self.controller.set_consumer(&participant, true);
        }

        match known {
            Some(track) => {
                tracing::debug!(participant = %participant, kind = %kind, "Stream already available");
                StreamReply::Ready(Some(MediaStream::from_track(track)))
            }
            None => StreamReply::Pending(self.requests.request(&participant, kind)),
        }
    }

    /// Republish local tracks from a new stream
    ///
    /// Bookkeeping is updated synchronously; the transport work (unpublish,
    /// role elevation, publishes) is spawned and replies to the caller once
    /// it settles, so a slow publish never stalls the tick timers.
    fn set_local_stream(&mut self, stream: Option<MediaStream>, reply: oneshot::Sender<Result<()>>) {
        self.local_audio = None;
        self.local_video = None;

        let Some(stream) = stream else {
            self.spawn_unpublish();
            let _ = reply.send(Ok(()));
            return;
        };

        let occupancy: Vec<usize> = self.channel_members.iter().map(|m| m.len()).collect();
        let channel = match self.allocator.pick(&occupancy) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(error = %e, "Publish deferred");
                self.spawn_unpublish();
                let _ = reply.send(Err(Error::ChannelsExhausted));
                return;
            }
        };
        let needs_elevation = self.allocator.chosen().is_none();

        let mut to_publish = Vec::new();
        for track in &stream.tracks {
            match track.kind {
                MediaKind::Audio => {
                    self.local_audio = Some(track.clone());
                    if self.mic_enabled {
                        let _ = self
                            .events
                            .send(SessionEvent::MicStateChanged { enabled: true });
                        to_publish.push(track.clone());
                    }
                }
                MediaKind::Video => {
                    self.local_video = Some(track.clone());
                    to_publish.push(track.clone());
                }
            }
            // Settle anyone already waiting on our own media
            self.requests.resolve(track.clone());
        }

        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcome_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.unpublish().await {
                tracing::warn!(error = %e, "Unpublish failed");
            }

            if needs_elevation {
                if let Err(e) = transport.set_host_role(channel).await {
                    tracing::warn!(channel = channel, error = %e, "Role elevation failed");
                    let _ = reply.send(Err(Error::Transport(e)));
                    return;
                }
                let _ = outcomes.send(Outcome::ChannelAssigned { channel }).await;
            }

            for track in to_publish {
                if let Err(e) = transport.publish(channel, track.clone()).await {
                    tracing::warn!(kind = %track.kind, error = %e, "Publish failed");
                }
            }
            let _ = reply.send(Ok(()));
        });
    }

    fn spawn_unpublish(&self) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.unpublish().await {
                tracing::warn!(error = %e, "Unpublish failed");
            }
        });
    }

    fn set_mic(&mut self, enabled: bool) {
        let enabled = if self.local_audio.is_none() && enabled {
            tracing::warn!("Mic toggle requested without a mic track");
            false
        } else {
            enabled
        };

        self.mic_enabled = enabled;
        self.transport.set_mic_enabled(enabled);
        let _ = self.events.send(SessionEvent::MicStateChanged { enabled });
    }

    /// Drop a participant from channels they no longer publish on
    fn refresh_channel_membership(&mut self, participant: &ParticipantId) {
        let audio = self.controller.publisher_channel(participant, MediaKind::Audio);
        let video = self.controller.publisher_channel(participant, MediaKind::Video);

        for (index, members) in self.channel_members.iter_mut().enumerate() {
            if audio != Some(index) && video != Some(index) {
                members.remove(participant);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::types::{Position, TrackHandle};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("roomsub=debug"))
            .with_test_writer()
            .try_init();
    }

    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<String>>,
        fail_join: AtomicBool,
        fail_subscribe: AtomicBool,
        slow_publish: AtomicBool,
        next_handle: AtomicU64,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl MediaTransport for FakeTransport {
        fn join(
            &self,
            room: &str,
            _identity: &ParticipantId,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            let fail = self.fail_join.load(Ordering::Relaxed);
            self.record(format!("join:{}", room));
            async move {
                if fail {
                    Err(TransportError::Rejected("no token".into()))
                } else {
                    Ok(())
                }
            }
        }

        fn publish(
            &self,
            channel: usize,
            track: MediaTrack,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            self.record(format!("publish:{}:{}", channel, track.kind));
            let slow = self.slow_publish.load(Ordering::Relaxed);
            async move {
                if slow {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(())
            }
        }

        fn unpublish(
            &self,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            self.record("unpublish".into());
            async { Ok(()) }
        }

        fn subscribe(
            &self,
            participant: ParticipantId,
            kind: MediaKind,
        ) -> impl std::future::Future<Output = std::result::Result<MediaTrack, TransportError>> + Send
        {
            self.record(format!("subscribe:{}:{}", participant, kind));
            let fail = self.fail_subscribe.load(Ordering::Relaxed);
            let handle = TrackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
            async move {
                if fail {
                    Err(TransportError::Rejected("backpressure".into()))
                } else {
                    Ok(MediaTrack::new(participant, kind, handle))
                }
            }
        }

        fn unsubscribe(
            &self,
            participant: ParticipantId,
            kind: MediaKind,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            self.record(format!("unsubscribe:{}:{}", participant, kind));
            async { Ok(()) }
        }

        fn set_host_role(
            &self,
            channel: usize,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            self.record(format!("host:{}", channel));
            async { Ok(()) }
        }

        fn play_audio(&self, participant: &ParticipantId) {
            self.record(format!("play:{}", participant));
        }

        fn stop_audio(&self, participant: &ParticipantId) {
            self.record(format!("stop:{}", participant));
        }

        fn set_mic_enabled(&self, enabled: bool) {
            self.record(format!("mic:{}", enabled));
        }
    }

    struct FixedPositions;

    impl PositionSource for FixedPositions {
        fn position_of(&self, _participant: &ParticipantId) -> Option<Position> {
            Some(Position::new(1.0, 0.0, 0.0))
        }

        fn self_position(&self) -> Option<Position> {
            Some(Position::default())
        }
    }

    struct NoRoles;

    impl RoleSource for NoRoles {
        fn is_privileged(&self, _participant: &ParticipantId) -> bool {
            false
        }
    }

    struct SilentMic;

    impl LevelSource for SilentMic {
        fn level(&mut self) -> Option<u32> {
            Some(0)
        }
    }

    struct Rig {
        handle: SessionHandle,
        transport: Arc<FakeTransport>,
        events_tx: mpsc::Sender<TransportEvent>,
        /// Subscribed before connect, so it sees the lifecycle events
        lifecycle: broadcast::Receiver<SessionEvent>,
        _signal_out: mpsc::Receiver<String>,
    }

    async fn rig() -> Rig {
        init_tracing();
        let transport = Arc::new(FakeTransport::default());
        let (session_events, lifecycle) = broadcast::channel(16);
        let (signal_tx, signal_out) = mpsc::channel(16);
        let (_signal_in_tx, signal_in) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(16);

        let handle = RoomSession::connect(
            SessionConfig::new("lobby", ParticipantId::new("me")),
            Arc::clone(&transport),
            FixedPositions,
            NoRoles,
            SilentMic,
            session_events,
            signal_tx,
            signal_in,
            events_rx,
        )
        .await
        .unwrap();

        Rig {
            handle,
            transport,
            events_tx,
            lifecycle,
            _signal_out: signal_out,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_failure_is_fatal_and_observable() {
        let transport = Arc::new(FakeTransport::default());
        transport.fail_join.store(true, Ordering::Relaxed);
        let (session_events, mut lifecycle) = broadcast::channel(16);
        let (signal_tx, _signal_out) = mpsc::channel(16);
        let (_sig_in_tx, signal_in) = mpsc::channel(16);
        let (_ev_tx, events_rx) = mpsc::channel::<TransportEvent>(16);

        let result = RoomSession::connect(
            SessionConfig::new("lobby", ParticipantId::new("me")),
            transport,
            FixedPositions,
            NoRoles,
            SilentMic,
            session_events,
            signal_tx,
            signal_in,
            events_rx,
        )
        .await;

        assert!(matches!(result, Err(Error::Join(_))));
        // The pre-subscribed receiver sees the fatal event as well
        assert_eq!(
            lifecycle.recv().await.unwrap(),
            SessionEvent::ConnectionErrorFatal
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_event_reaches_early_subscriber() {
        let mut rig = rig().await;

        assert_eq!(rig.lifecycle.recv().await.unwrap(), SessionEvent::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_subscribes_new_publisher() {
        let rig = rig().await;
        let alice = ParticipantId::new("alice");

        rig.events_tx
            .send(TransportEvent::UserPublished {
                participant: alice.clone(),
                kind: MediaKind::Audio,
                channel: 0,
            })
            .await
            .unwrap();

        // Past one admission period the subscribe has been issued
        tokio::time::sleep(Duration::from_millis(400)).await;

        let calls = rig.transport.calls();
        assert!(calls.contains(&"subscribe:alice:audio".to_string()));
        // No consumer attached: playback starts locally
        assert!(calls.contains(&"play:alice".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_before_publish_resolves_on_arrival() {
        let rig = rig().await;
        let bob = ParticipantId::new("bob");

        let handle = rig.handle.clone();
        let waiter = tokio::spawn({
            let bob = bob.clone();
            async move { handle.request_media_stream(bob, MediaKind::Video).await }
        });

        // Give the request time to park
        tokio::time::sleep(Duration::from_millis(50)).await;

        rig.events_tx
            .send(TransportEvent::UserPublished {
                participant: bob.clone(),
                kind: MediaKind::Video,
                channel: 0,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let stream = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(stream.track(MediaKind::Video).unwrap().participant, bob);
    }

    #[tokio::test(start_paused = true)]
    async fn test_departure_resolves_request_with_none() {
        let rig = rig().await;
        let carol = ParticipantId::new("carol");

        let handle = rig.handle.clone();
        let waiter = tokio::spawn({
            let carol = carol.clone();
            async move { handle.request_media_stream(carol, MediaKind::Audio).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        rig.events_tx
            .send(TransportEvent::UserLeft {
                participant: carol,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(waiter.await.unwrap().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpublish_triggers_unsubscribe_on_next_tick() {
        let rig = rig().await;
        let alice = ParticipantId::new("alice");

        rig.events_tx
            .send(TransportEvent::UserPublished {
                participant: alice.clone(),
                kind: MediaKind::Audio,
                channel: 0,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        rig.events_tx
            .send(TransportEvent::UserUnpublished {
                participant: alice.clone(),
                kind: MediaKind::Audio,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        // The track is gone; a fresh request parks instead of reusing it
        let handle = rig.handle.clone();
        let waiter = tokio::spawn(async move {
            handle
                .request_media_stream(ParticipantId::new("alice"), MediaKind::Audio)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        waiter.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_local_stream_publishes_and_resolves_self_request() {
        let rig = rig().await;
        let me = ParticipantId::new("me");

        let handle = rig.handle.clone();
        let waiter = tokio::spawn({
            let me = me.clone();
            async move { handle.request_media_stream(me, MediaKind::Video).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let track = MediaTrack::new(me.clone(), MediaKind::Video, TrackHandle(9));
        rig.handle
            .set_local_media_stream(Some(MediaStream::from_track(track)))
            .await
            .unwrap();

        let stream = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(stream.track(MediaKind::Video).unwrap().handle, TrackHandle(9));

        let calls = rig.transport.calls();
        assert!(calls.contains(&"host:0".to_string()));
        assert!(calls.contains(&"publish:0:video".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mic_toggle_without_track_stays_disabled() {
        let rig = rig().await;
        let mut events = rig.handle.events();

        rig.handle.set_mic_enabled(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!rig.handle.is_mic_enabled().await.unwrap());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::MicStateChanged { enabled: false }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_parked_requests() {
        let rig = rig().await;

        let handle = rig.handle.clone();
        let waiter = tokio::spawn(async move {
            handle
                .request_media_stream(ParticipantId::new("ghost"), MediaKind::Audio)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        rig.handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(waiter.await.unwrap(), Err(Error::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_publish_does_not_stall_reconciliation() {
        let rig = rig().await;
        rig.transport.slow_publish.store(true, Ordering::Relaxed);

        let handle = rig.handle.clone();
        let publisher = tokio::spawn(async move {
            let track =
                MediaTrack::new(ParticipantId::new("me"), MediaKind::Video, TrackHandle(1));
            handle
                .set_local_media_stream(Some(MediaStream::from_track(track)))
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Admission keeps ticking while the publish is still in flight
        let alice = ParticipantId::new("alice");
        rig.events_tx
            .send(TransportEvent::UserPublished {
                participant: alice,
                kind: MediaKind::Audio,
                channel: 0,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!publisher.is_finished());
        assert!(rig
            .transport
            .calls()
            .contains(&"subscribe:alice:audio".to_string()));
        publisher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscribe_retries_next_tick() {
        let rig = rig().await;
        let alice = ParticipantId::new("alice");

        rig.transport.fail_subscribe.store(true, Ordering::Relaxed);
        rig.events_tx
            .send(TransportEvent::UserPublished {
                participant: alice.clone(),
                kind: MediaKind::Audio,
                channel: 0,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        rig.transport.fail_subscribe.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(400)).await;

        let subscribes = rig
            .transport
            .calls()
            .iter()
            .filter(|c| c.as_str() == "subscribe:alice:audio")
            .count();
        assert!(subscribes >= 2);
    }
}
