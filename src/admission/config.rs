//! Admission controller configuration

use std::time::Duration;

use crate::types::MediaKind;

/// Configuration for the subscription admission controller
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Maximum concurrent audio subscriptions
    pub audio_slots: usize,

    /// Maximum concurrent video subscriptions
    pub video_slots: usize,

    /// Maximum distance for audio candidates (None = unlimited)
    pub audio_cutoff: Option<f32>,

    /// Maximum distance for video candidates (None = unlimited)
    pub video_cutoff: Option<f32>,

    /// Reconciliation period
    pub tick_period: Duration,

    /// Rank recent speakers ahead of distance-only candidates
    pub speaker_priority: bool,

    /// Rank privileged participants ahead of everyone
    pub admin_priority: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            audio_slots: 8,
            video_slots: 4,
            audio_cutoff: None,
            video_cutoff: None,
            tick_period: Duration::from_millis(300),
            speaker_priority: true,
            admin_priority: true,
        }
    }
}

impl AdmissionConfig {
    /// Slot limit for a kind
    pub fn slots(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Audio => self.audio_slots,
            MediaKind::Video => self.video_slots,
        }
    }

    /// Distance cutoff for a kind
    pub fn cutoff(&self, kind: MediaKind) -> Option<f32> {
        match kind {
            MediaKind::Audio => self.audio_cutoff,
            MediaKind::Video => self.video_cutoff,
        }
    }

    /// Set the audio slot limit
    pub fn audio_slots(mut self, slots: usize) -> Self {
        self.audio_slots = slots;
        self
    }

    /// Set the video slot limit
    pub fn video_slots(mut self, slots: usize) -> Self {
        self.video_slots = slots;
        self
    }

    /// Set the audio distance cutoff
    pub fn audio_cutoff(mut self, cutoff: f32) -> Self {
        self.audio_cutoff = Some(cutoff);
        self
    }

    /// Set the video distance cutoff
    pub fn video_cutoff(mut self, cutoff: f32) -> Self {
        self.video_cutoff = Some(cutoff);
        self
    }

    /// Set the reconciliation period
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Enable or disable speaker priority tiers
    pub fn speaker_priority(mut self, enabled: bool) -> Self {
        self.speaker_priority = enabled;
        self
    }

    /// Enable or disable admin priority
    pub fn admin_priority(mut self, enabled: bool) -> Self {
        self.admin_priority = enabled;
        self
    }
}
