//! Pending media request registry
//!
//! Bridges "a consumer wants participant X's stream" with "the track has not
//! arrived yet". A request made before the track exists parks a settleable
//! future under the (participant, kind) pair; track arrival, participant
//! departure, or session teardown settles it. No future is ever leaked
//! unsettled.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::types::{MediaKind, MediaStream, MediaTrack, ParticipantId};

/// Waiters parked on one (participant, kind) pair
///
/// A second request for a still-pending pair joins the existing entry, so
/// every waiter observes the identical settlement.
#[derive(Debug, Default)]
struct Waiters {
    senders: Vec<oneshot::Sender<Option<MediaStream>>>,
}

impl Waiters {
    fn settle(self, result: Option<MediaStream>) {
        for tx in self.senders {
            // A dropped receiver just means the consumer stopped caring
            let _ = tx.send(result.clone());
        }
    }
}

/// Per-participant pending requests, at most one live entry per kind
#[derive(Debug, Default)]
struct ParticipantRequests {
    audio: Option<Waiters>,
    video: Option<Waiters>,
}

impl ParticipantRequests {
    fn slot(&mut self, kind: MediaKind) -> &mut Option<Waiters> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }

    fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

/// Registry of outstanding media requests
///
/// Dropping the registry drops every parked sender, which rejects the
/// corresponding receivers; that is the teardown path.
#[derive(Debug, Default)]
pub struct MediaRequests {
    pending: HashMap<ParticipantId, ParticipantRequests>,
}

impl MediaRequests {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request for a track that has not arrived yet
    ///
    /// The returned receiver settles with `Some(stream)` when the track
    /// arrives, `None` when the participant departs first, or a receive
    /// error if the session tears down.
    pub fn request(
        &mut self,
        participant: &ParticipantId,
        kind: MediaKind,
    ) -> oneshot::Receiver<Option<MediaStream>> {
        let (tx, rx) = oneshot::channel();

        let entry = self.pending.entry(participant.clone()).or_default();
        let waiters = entry.slot(kind).get_or_insert_with(Waiters::default);
        waiters.senders.push(tx);

        tracing::debug!(
            participant = %participant,
            kind = %kind,
            waiters = waiters.senders.len(),
            "Media request parked"
        );

        rx
    }

    /// Whether a request is pending for the pair
    pub fn is_pending(&self, participant: &ParticipantId, kind: MediaKind) -> bool {
        self.pending
            .get(participant)
            .map(|entry| match kind {
                MediaKind::Audio => entry.audio.is_some(),
                MediaKind::Video => entry.video.is_some(),
            })
            .unwrap_or(false)
    }

    /// Settle the pending request matching an arrived track
    ///
    /// The kind is derived from the track. Settled kinds are dropped; the
    /// participant entry goes away once nothing remains pending for it.
    pub fn resolve(&mut self, track: MediaTrack) {
        let participant = track.participant.clone();
        let kind = track.kind;

        let Some(entry) = self.pending.get_mut(&participant) else {
            return;
        };

        if let Some(waiters) = entry.slot(kind).take() {
            tracing::debug!(
                participant = %participant,
                kind = %kind,
                "Media request resolved"
            );
            waiters.settle(Some(MediaStream::from_track(track)));
        }

        if entry.is_empty() {
            self.pending.remove(&participant);
        }
    }

    /// Settle everything outstanding for a departed participant with `None`
    ///
    /// "No stream available" is a legitimate terminal state, not a failure.
    pub fn close_participant(&mut self, participant: &ParticipantId) {
        let Some(entry) = self.pending.remove(participant) else {
            return;
        };

        tracing::debug!(participant = %participant, "Closing pending media requests");
        if let Some(waiters) = entry.audio {
            waiters.settle(None);
        }
        if let Some(waiters) = entry.video {
            waiters.settle(None);
        }
    }

    /// Number of participants with something pending
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::types::TrackHandle;

    fn track(id: &str, kind: MediaKind) -> MediaTrack {
        MediaTrack::new(ParticipantId::new(id), kind, TrackHandle(42))
    }

    #[test]
    fn test_resolve_settles_with_stream() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("alice");

        let mut rx = task::spawn(requests.request(&p, MediaKind::Video));
        assert_pending!(rx.poll());

        requests.resolve(track("alice", MediaKind::Video));

        let stream = assert_ready!(rx.poll()).unwrap().unwrap();
        assert_eq!(stream.track(MediaKind::Video).unwrap().handle, TrackHandle(42));

        // The pair is gone; nothing remained pending for alice
        assert!(!requests.is_pending(&p, MediaKind::Video));
        assert!(requests.is_empty());
    }

    #[test]
    fn test_resolve_keeps_other_kind_pending() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("alice");

        let _audio = requests.request(&p, MediaKind::Audio);
        let _video = requests.request(&p, MediaKind::Video);

        requests.resolve(track("alice", MediaKind::Audio));

        assert!(!requests.is_pending(&p, MediaKind::Audio));
        assert!(requests.is_pending(&p, MediaKind::Video));
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_second_request_joins_same_entry() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("bob");

        let mut first = task::spawn(requests.request(&p, MediaKind::Audio));
        let mut second = task::spawn(requests.request(&p, MediaKind::Audio));
        assert_eq!(requests.len(), 1);

        requests.resolve(track("bob", MediaKind::Audio));

        // Both waiters observe the identical settlement
        let a = assert_ready!(first.poll()).unwrap().unwrap();
        let b = assert_ready!(second.poll()).unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_close_participant_resolves_with_none() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("carol");

        let mut rx = task::spawn(requests.request(&p, MediaKind::Audio));
        requests.close_participant(&p);

        // Resolved, not rejected
        let result = assert_ready!(rx.poll()).unwrap();
        assert_eq!(result, None);
        assert!(requests.is_empty());
    }

    #[test]
    fn test_request_after_close_is_fresh() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("carol");

        let _stale = requests.request(&p, MediaKind::Audio);
        requests.close_participant(&p);

        let mut fresh = task::spawn(requests.request(&p, MediaKind::Audio));
        assert_pending!(fresh.poll());

        requests.resolve(track("carol", MediaKind::Audio));
        assert!(assert_ready!(fresh.poll()).unwrap().is_some());
    }

    #[test]
    fn test_teardown_rejects_outstanding_futures() {
        let mut requests = MediaRequests::new();
        let p = ParticipantId::new("dave");

        let mut rx = task::spawn(requests.request(&p, MediaKind::Video));
        drop(requests);

        // Sender dropped: the receiver errors rather than hanging
        assert!(assert_ready!(rx.poll()).is_err());
    }

    #[test]
    fn test_resolve_without_request_is_noop() {
        let mut requests = MediaRequests::new();
        requests.resolve(track("nobody", MediaKind::Audio));
        assert!(requests.is_empty());
    }
}
