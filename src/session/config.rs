//! Session configuration

use crate::admission::AdmissionConfig;
use crate::types::ParticipantId;
use crate::vad::VadConfig;

/// Transport channel topology for one room
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Number of parallel transport channels backing the room
    pub count: usize,

    /// Publisher capacity per channel
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: 1,
            capacity: 16,
        }
    }
}

impl ChannelConfig {
    /// Set the channel count
    pub fn count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    /// Set the per-channel publisher capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Complete configuration for one room session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Room to join
    pub room: String,

    /// Local participant identity
    pub identity: ParticipantId,

    /// Admission controller tuning
    pub admission: AdmissionConfig,

    /// Voice activity detector tuning
    pub vad: VadConfig,

    /// Channel topology
    pub channels: ChannelConfig,
}

impl SessionConfig {
    /// Create a config for a room and identity with default tuning
    pub fn new(room: impl Into<String>, identity: ParticipantId) -> Self {
        Self {
            room: room.into(),
            identity,
            admission: AdmissionConfig::default(),
            vad: VadConfig::default(),
            channels: ChannelConfig::default(),
        }
    }

    /// Replace the admission tuning
    pub fn admission(mut self, admission: AdmissionConfig) -> Self {
        self.admission = admission;
        self
    }

    /// Replace the VAD tuning
    pub fn vad(mut self, vad: VadConfig) -> Self {
        self.vad = vad;
        self
    }

    /// Replace the channel topology
    pub fn channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("lobby", ParticipantId::new("me"));

        assert_eq!(config.room, "lobby");
        assert_eq!(config.channels.count, 1);
        assert_eq!(config.channels.capacity, 16);
        assert_eq!(config.admission.audio_slots, 8);
    }

    #[test]
    fn test_channel_builder_floors() {
        let channels = ChannelConfig::default().count(0).capacity(0);

        assert_eq!(channels.count, 1);
        assert_eq!(channels.capacity, 1);
    }
}
