//! Tiered candidate ranking
//!
//! Computes the expected subscription set for one media kind. When every
//! publisher fits and no distance cutoff applies, ranking is skipped
//! entirely; otherwise slots fill tier by tier:
//!
//! - Tier 0: privileged publishers, any distance, admin-list order
//! - Tier 1 (audio): speakers from the last moments, store order
//! - Tier 2 (audio): recent speakers by ascending distance
//! - Tier 3: everyone else by ascending distance
//!
//! A candidate with no resolvable distance is excluded from the
//! distance-aware tiers for this tick; that is missing context, not an error.

use std::collections::{HashMap, HashSet};

use crate::types::{MediaKind, ParticipantId};
use crate::vad::PrioritySignals;

use super::config::AdmissionConfig;

/// Inputs for one per-kind ranking pass
pub(crate) struct RankInput<'a> {
    pub kind: MediaKind,
    pub config: &'a AdmissionConfig,
    /// Current publishers of this kind
    pub publishers: &'a HashMap<ParticipantId, usize>,
    /// Privileged publishers in admin-list order
    pub admins: &'a [ParticipantId],
    /// Speaking-signal store
    pub signals: &'a PrioritySignals,
    /// Distance to self, for every participant with a resolvable position
    pub distances: &'a HashMap<ParticipantId, f32>,
}

/// Accumulates admitted candidates up to the slot limit, deduplicated
struct SlotFill {
    selected: Vec<ParticipantId>,
    taken: HashSet<ParticipantId>,
    slots: usize,
}

impl SlotFill {
    fn new(slots: usize) -> Self {
        Self {
            selected: Vec::with_capacity(slots),
            taken: HashSet::with_capacity(slots),
            slots,
        }
    }

    fn admit(&mut self, id: &ParticipantId) {
        if !self.full() && !self.taken.contains(id) {
            self.taken.insert(id.clone());
            self.selected.push(id.clone());
        }
    }

    fn full(&self) -> bool {
        self.selected.len() >= self.slots
    }
}

/// Compute the expected subscription set, in admission order
pub(crate) fn expected_set(input: RankInput<'_>) -> Vec<ParticipantId> {
    let slots = input.config.slots(input.kind);
    let cutoff = input.config.cutoff(input.kind);

    // Everyone fits and nobody is distance-filtered: no ranking needed
    if input.publishers.len() <= slots && cutoff.is_none() {
        return input.publishers.keys().cloned().collect();
    }

    let within_cutoff = |id: &ParticipantId| match cutoff {
        Some(max) => matches!(input.distances.get(id), Some(d) if *d <= max),
        None => true,
    };

    let mut fill = SlotFill::new(slots);

    // Tier 0: admins bypass the distance cutoff entirely
    if input.config.admin_priority {
        for id in input.admins {
            if fill.full() {
                break;
            }
            if input.publishers.contains_key(id) {
                fill.admit(id);
            }
        }
    }

    let speaker_tiers = input.kind == MediaKind::Audio && input.config.speaker_priority;

    // Tier 1: whoever is speaking right now, in store order
    if speaker_tiers && !fill.full() {
        for id in input.signals.very_recent() {
            if input.publishers.contains_key(id) && within_cutoff(id) {
                fill.admit(id);
            }
        }
    }

    // Tier 2: recent speakers, nearest first
    if speaker_tiers && !fill.full() {
        let mut by_distance: Vec<(&ParticipantId, f32)> = input
            .signals
            .recent()
            .filter(|id| input.publishers.contains_key(*id))
            .filter_map(|id| input.distances.get(id).map(|d| (id, *d)))
            .collect();
        by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (id, _) in by_distance {
            if within_cutoff(id) {
                fill.admit(id);
            }
        }
    }

    // Tier 3: everyone else, nearest first
    if !fill.full() {
        let mut remaining: Vec<(&ParticipantId, f32)> = input
            .publishers
            .keys()
            .filter_map(|id| input.distances.get(id).map(|d| (id, *d)))
            .collect();
        remaining.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (id, _) in remaining {
            if within_cutoff(id) {
                fill.admit(id);
            }
        }
    }

    fill.selected
}
