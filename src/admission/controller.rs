//! Subscription admission controller
//!
//! Owns the publisher and subscription maps for one room session and turns
//! each tick into a reconciliation plan. Bookkeeping is optimistic: a planned
//! subscribe inserts a `Pending` entry immediately and a planned unsubscribe
//! removes its entry immediately; failures roll back via
//! [`AdmissionController::complete_subscribe`]. Running the same tick twice
//! with unchanged inputs therefore plans no additional work.

use std::collections::{HashMap, HashSet};

use crate::transport::{PositionSource, RoleSource};
use crate::types::{MediaKind, ParticipantId};
use crate::vad::PrioritySignals;

use super::config::AdmissionConfig;
use super::ranking::{expected_set, RankInput};

/// Lifecycle of one subscription map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Subscribe issued, transport has not confirmed yet
    Pending,
    /// Transport confirmed; the track is live
    Active,
}

/// One entry in the subscription map
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Channel the publisher's track is carried on
    pub channel: usize,
    /// Entry lifecycle state
    pub state: SubscriptionState,
}

/// Work produced by one admission tick
///
/// The session loop executes subscribe/unsubscribe asynchronously and starts
/// or stops raw audio playback synchronously.
#[derive(Debug, Default)]
pub struct TickPlan {
    /// Pairs to subscribe to
    pub subscribe: Vec<(ParticipantId, MediaKind)>,
    /// Pairs to unsubscribe from
    pub unsubscribe: Vec<(ParticipantId, MediaKind)>,
    /// Participants whose audio should start playing locally
    pub play: Vec<ParticipantId>,
    /// Participants whose local audio playback should stop
    pub stop: Vec<ParticipantId>,
}

impl TickPlan {
    /// Whether the tick planned any work at all
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty()
            && self.unsubscribe.is_empty()
            && self.play.is_empty()
            && self.stop.is_empty()
    }
}

/// Per-kind publisher and subscription bookkeeping
#[derive(Debug, Default)]
struct KindState {
    /// Participant -> channel carrying their track
    publishers: HashMap<ParticipantId, usize>,
    /// Participant -> local subscription entry
    subscriptions: HashMap<ParticipantId, Subscription>,
}

/// Decides which publishers the local client receives
#[derive(Debug)]
pub struct AdmissionController {
    config: AdmissionConfig,
    audio: KindState,
    video: KindState,
    /// Privileged publishers, insertion ordered
    admins: Vec<ParticipantId>,
    /// Participants whose audio we started playing ourselves
    autoplay: HashSet<ParticipantId>,
    /// Participants with an external audio consumer attached
    consumers: HashSet<ParticipantId>,
}

impl AdmissionController {
    /// Create a controller with the given configuration
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            audio: KindState::default(),
            video: KindState::default(),
            admins: Vec::new(),
            autoplay: HashSet::new(),
            consumers: HashSet::new(),
        }
    }

    /// The controller configuration
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    fn kind(&self, kind: MediaKind) -> &KindState {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }

    fn kind_mut(&mut self, kind: MediaKind) -> &mut KindState {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }

    /// Record a publish event
    pub fn on_published(&mut self, participant: &ParticipantId, kind: MediaKind, channel: usize) {
        self.kind_mut(kind)
            .publishers
            .insert(participant.clone(), channel);

        tracing::debug!(
            participant = %participant,
            kind = %kind,
            channel = channel,
            "Publisher added"
        );
    }

    /// Record an unpublish event
    ///
    /// The subscription entry, if any, is dropped immediately; the remote
    /// track is gone regardless. Returns whether local auto-playback was
    /// running and should stop.
    pub fn on_unpublished(&mut self, participant: &ParticipantId, kind: MediaKind) -> bool {
        let state = self.kind_mut(kind);
        state.publishers.remove(participant);
        state.subscriptions.remove(participant);

        tracing::debug!(participant = %participant, kind = %kind, "Publisher removed");

        kind == MediaKind::Audio && self.autoplay.remove(participant)
    }

    /// Record a departure; clears both kinds plus the admin list
    pub fn on_left(&mut self, participant: &ParticipantId) -> bool {
        let audio_played = self.on_unpublished(participant, MediaKind::Audio);
        self.on_unpublished(participant, MediaKind::Video);
        self.admins.retain(|id| id != participant);
        self.consumers.remove(participant);
        audio_played
    }

    /// Mark whether an external consumer holds this participant's audio
    pub fn set_consumer(&mut self, participant: &ParticipantId, attached: bool) {
        if attached {
            self.consumers.insert(participant.clone());
        } else {
            self.consumers.remove(participant);
        }
    }

    /// Publisher count for a kind
    pub fn publisher_count(&self, kind: MediaKind) -> usize {
        self.kind(kind).publishers.len()
    }

    /// Channel a participant publishes the given kind on
    pub fn publisher_channel(&self, participant: &ParticipantId, kind: MediaKind) -> Option<usize> {
        self.kind(kind).publishers.get(participant).copied()
    }

    /// Current subscription entry for a pair
    pub fn subscription(
        &self,
        participant: &ParticipantId,
        kind: MediaKind,
    ) -> Option<&Subscription> {
        self.kind(kind).subscriptions.get(participant)
    }

    /// Number of subscription entries for a kind
    pub fn subscription_count(&self, kind: MediaKind) -> usize {
        self.kind(kind).subscriptions.len()
    }

    /// Run one admission tick
    ///
    /// Synchronous: ranks candidates from a single consistent snapshot and
    /// diffs the expected set against the subscription map per kind.
    pub fn tick(
        &mut self,
        positions: &dyn PositionSource,
        roles: &dyn RoleSource,
        signals: &PrioritySignals,
    ) -> TickPlan {
        self.refresh_admins(roles);
        let distances = self.compute_distances(positions);

        let mut plan = TickPlan::default();
        for kind in MediaKind::ALL {
            self.reconcile_kind(kind, &distances, signals, &mut plan);
        }
        self.reconcile_playback(&mut plan);
        plan
    }

    /// Promote or roll back an optimistic subscribe
    ///
    /// Failure rolls the entry back only while it is still `Pending`; an
    /// entry replaced by later ticks is left alone.
    pub fn complete_subscribe(&mut self, participant: &ParticipantId, kind: MediaKind, ok: bool) {
        let subs = &mut self.kind_mut(kind).subscriptions;
        match subs.get_mut(participant) {
            Some(sub) if ok => {
                sub.state = SubscriptionState::Active;
            }
            Some(sub) if sub.state == SubscriptionState::Pending => {
                subs.remove(participant);
                tracing::warn!(
                    participant = %participant,
                    kind = %kind,
                    "Subscribe failed, entry rolled back"
                );
            }
            _ => {}
        }
    }

    /// Rebuild the admin list against the roles feed, preserving order
    fn refresh_admins(&mut self, roles: &dyn RoleSource) {
        let is_publisher = |id: &ParticipantId, this: &Self| {
            this.audio.publishers.contains_key(id) || this.video.publishers.contains_key(id)
        };

        let kept: Vec<ParticipantId> = self
            .admins
            .iter()
            .filter(|id| is_publisher(id, self) && roles.is_privileged(id))
            .cloned()
            .collect();
        self.admins = kept;

        let mut newcomers: Vec<ParticipantId> = Vec::new();
        for id in self
            .audio
            .publishers
            .keys()
            .chain(self.video.publishers.keys())
        {
            if roles.is_privileged(id)
                && !self.admins.contains(id)
                && !newcomers.contains(id)
            {
                newcomers.push(id.clone());
            }
        }
        self.admins.extend(newcomers);
    }

    /// Distance to self for every publisher with a resolvable position
    fn compute_distances(&self, positions: &dyn PositionSource) -> HashMap<ParticipantId, f32> {
        let Some(own) = positions.self_position() else {
            return HashMap::new();
        };

        self.audio
            .publishers
            .keys()
            .chain(self.video.publishers.keys())
            .filter_map(|id| {
                positions
                    .position_of(id)
                    .map(|pos| (id.clone(), own.distance_to(&pos)))
            })
            .collect()
    }

    fn reconcile_kind(
        &mut self,
        kind: MediaKind,
        distances: &HashMap<ParticipantId, f32>,
        signals: &PrioritySignals,
        plan: &mut TickPlan,
    ) {
        let expected = expected_set(RankInput {
            kind,
            config: &self.config,
            publishers: &self.kind(kind).publishers,
            admins: &self.admins,
            signals,
            distances,
        });
        let expected_keys: HashSet<&ParticipantId> = expected.iter().collect();

        // Drop whatever is no longer wanted; optimistic removal
        let dropped: Vec<ParticipantId> = self
            .kind(kind)
            .subscriptions
            .keys()
            .filter(|id| !expected_keys.contains(id))
            .cloned()
            .collect();
        for id in dropped {
            self.kind_mut(kind).subscriptions.remove(&id);
            if kind == MediaKind::Audio && self.autoplay.remove(&id) {
                plan.stop.push(id.clone());
            }
            plan.unsubscribe.push((id, kind));
        }

        // Subscribe to newcomers; optimistic Pending entry
        for id in expected {
            if self.kind(kind).subscriptions.contains_key(&id) {
                continue;
            }
            let Some(channel) = self.kind(kind).publishers.get(&id).copied() else {
                continue;
            };
            self.kind_mut(kind).subscriptions.insert(
                id.clone(),
                Subscription {
                    channel,
                    state: SubscriptionState::Pending,
                },
            );
            plan.subscribe.push((id, kind));
        }
    }

    /// Start raw playback for expected audio without a consumer; stop it
    /// where a consumer has since attached, avoiding double audio
    fn reconcile_playback(&mut self, plan: &mut TickPlan) {
        let expected: Vec<ParticipantId> = self.audio.subscriptions.keys().cloned().collect();

        for id in expected {
            if self.consumers.contains(&id) {
                if self.autoplay.remove(&id) {
                    plan.stop.push(id);
                }
            } else if self.autoplay.insert(id.clone()) {
                plan.play.push(id);
            }
        }
    }
}
