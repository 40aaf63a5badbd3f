//! Bounded recency sets of recently-speaking peers
//!
//! Inbound speaking signals feed two deduplicated, insertion-ordered sets:
//! a larger "spoke recently" set and a smaller "speaking just now" set. The
//! admission ranking consults both when subscription slots are contested.

use std::collections::VecDeque;

use crate::types::ParticipantId;

/// Deduplicated insertion-ordered set with oldest-evicted-first overflow
#[derive(Debug)]
struct BoundedSet {
    items: VecDeque<ParticipantId>,
    capacity: usize,
}

impl BoundedSet {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Insert keeping existing position on duplicates
    fn insert(&mut self, id: &ParticipantId) {
        if self.items.contains(id) {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(id.clone());
    }

    /// Insert moving duplicates to the most-recent position
    fn insert_refresh(&mut self, id: &ParticipantId) {
        self.remove(id);
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(id.clone());
    }

    fn remove(&mut self, id: &ParticipantId) {
        if let Some(pos) = self.items.iter().position(|p| p == id) {
            self.items.remove(pos);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.items.iter()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Store of inbound speaking signals used to bias subscription ranking
#[derive(Debug)]
pub struct PrioritySignals {
    /// Everyone who spoke recently; trimmed only by capacity or an
    /// explicit stopped-speaking signal
    recent: BoundedSet,
    /// Speakers from the last few moments; entries age out purely by
    /// capacity eviction
    very_recent: BoundedSet,
}

impl PrioritySignals {
    /// Create a store sized for the given audio slot limit
    ///
    /// The recent set holds twice the slot limit, the very-recent set holds
    /// exactly the slot limit.
    pub fn new(audio_slots: usize) -> Self {
        Self {
            recent: BoundedSet::new(audio_slots.max(1) * 2),
            very_recent: BoundedSet::new(audio_slots.max(1)),
        }
    }

    /// Record an inbound speaking-started signal for a peer
    pub fn on_speaking(&mut self, participant: &ParticipantId) {
        self.recent.insert(participant);
        self.very_recent.insert_refresh(participant);
    }

    /// Record an inbound speaking-stopped signal for a peer
    ///
    /// Only the recent set is trimmed; very-recent entries age out via
    /// capacity eviction.
    pub fn on_silent(&mut self, participant: &ParticipantId) {
        self.recent.remove(participant);
    }

    /// Forget a departed participant entirely
    pub fn on_left(&mut self, participant: &ParticipantId) {
        self.recent.remove(participant);
        self.very_recent.remove(participant);
    }

    /// Recently-speaking peers, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &ParticipantId> {
        self.recent.iter()
    }

    /// Just-now speakers, oldest first
    pub fn very_recent(&self) -> impl Iterator<Item = &ParticipantId> {
        self.very_recent.iter()
    }

    /// Number of entries in the recent set
    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    /// Number of entries in the very-recent set
    pub fn very_recent_len(&self) -> usize {
        self.very_recent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ParticipantId {
        ParticipantId::new(format!("p{}", n))
    }

    #[test]
    fn test_speaking_enters_both_sets() {
        let mut signals = PrioritySignals::new(4);
        signals.on_speaking(&id(1));

        assert_eq!(signals.recent_len(), 1);
        assert_eq!(signals.very_recent_len(), 1);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut signals = PrioritySignals::new(2);

        for n in 0..10 {
            signals.on_speaking(&id(n));
        }

        assert_eq!(signals.recent_len(), 4); // 2x slot limit
        assert_eq!(signals.very_recent_len(), 2);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut signals = PrioritySignals::new(2);

        signals.on_speaking(&id(1));
        signals.on_speaking(&id(2));
        signals.on_speaking(&id(3));

        let very_recent: Vec<_> = signals.very_recent().cloned().collect();
        assert_eq!(very_recent, vec![id(2), id(3)]);
    }

    #[test]
    fn test_duplicate_does_not_grow() {
        let mut signals = PrioritySignals::new(4);

        signals.on_speaking(&id(1));
        signals.on_speaking(&id(1));

        assert_eq!(signals.recent_len(), 1);
        assert_eq!(signals.very_recent_len(), 1);
    }

    #[test]
    fn test_duplicate_promotes_only_in_very_recent() {
        let mut signals = PrioritySignals::new(4);

        signals.on_speaking(&id(1));
        signals.on_speaking(&id(2));
        signals.on_speaking(&id(1));

        // Recent keeps original insertion order
        let recent: Vec<_> = signals.recent().cloned().collect();
        assert_eq!(recent, vec![id(1), id(2)]);

        // Very-recent moves the duplicate to most-recent
        let very_recent: Vec<_> = signals.very_recent().cloned().collect();
        assert_eq!(very_recent, vec![id(2), id(1)]);
    }

    #[test]
    fn test_silent_trims_recent_only() {
        let mut signals = PrioritySignals::new(4);

        signals.on_speaking(&id(1));
        signals.on_silent(&id(1));

        assert_eq!(signals.recent_len(), 0);
        assert_eq!(signals.very_recent_len(), 1);
    }

    #[test]
    fn test_departure_clears_both() {
        let mut signals = PrioritySignals::new(4);

        signals.on_speaking(&id(1));
        signals.on_left(&id(1));

        assert_eq!(signals.recent_len(), 0);
        assert_eq!(signals.very_recent_len(), 0);
    }
}
