//! Local voice activity detection
//!
//! Classifies the local mic as speaking or silent from periodic level
//! samples. Quiet samples feed a sliding window whose median approximates
//! ambient background noise; an exceed counter debounces the start of speech
//! and a subceed countdown debounces the end, so brief pauses inside a
//! sentence do not flap the speaking state.

use std::collections::VecDeque;

use super::config::VadConfig;

/// Speaking-state transition produced by a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    /// The local participant started speaking
    Started,
    /// The local participant stopped speaking
    Stopped,
}

/// Per-session voice activity detector
///
/// Pure per-sample state machine; the caller drives it on a fixed period and
/// reacts to the returned transitions.
#[derive(Debug)]
pub struct VoiceDetector {
    config: VadConfig,

    /// Recent quiet levels in arrival order
    ring: VecDeque<u32>,
    /// The same levels kept sorted for median lookup
    sorted: Vec<u32>,

    /// Consecutive loud samples while silent
    exceed: u32,
    /// Quiet-sample countdown while speaking; `None` means not speaking
    subceed: Option<u32>,
}

impl VoiceDetector {
    /// Create a detector with the given tuning
    pub fn new(config: VadConfig) -> Self {
        Self {
            ring: VecDeque::with_capacity(config.window),
            sorted: Vec::with_capacity(config.window),
            exceed: 0,
            subceed: None,
            config,
        }
    }

    /// Whether a speaking episode is currently in progress
    pub fn is_speaking(&self) -> bool {
        self.subceed.is_some()
    }

    /// Current subceed countdown, while speaking
    pub fn countdown(&self) -> Option<u32> {
        self.subceed
    }

    /// Current background noise estimate
    ///
    /// Floor of 1.5x the median of the quiet-sample window; zero until the
    /// window has data.
    pub fn background(&self) -> u32 {
        match self.sorted.get(self.sorted.len() / 2) {
            Some(median) => median * 3 / 2,
            None => 0,
        }
    }

    /// Feed one level sample (0..=100), returning any state transition
    pub fn sample(&mut self, level: u32) -> Option<VadTransition> {
        // Obvious speech spikes stay out of the background window
        if level < self.config.noise_ceiling {
            if self.ring.len() == self.config.window {
                if let Some(evicted) = self.ring.pop_front() {
                    if let Ok(pos) = self.sorted.binary_search(&evicted) {
                        self.sorted.remove(pos);
                    }
                }
            }
            self.ring.push_back(level);
            let pos = self.sorted.partition_point(|&v| v < level);
            self.sorted.insert(pos, level);
        }

        let background = self.background();
        let loud = level > background + self.config.silence_offset;

        match self.subceed {
            Some(countdown) => {
                if loud {
                    // Still talking
                    self.subceed = Some(self.config.stop_countdown);
                    None
                } else if level < background + self.config.subceed_offset {
                    if countdown <= 1 {
                        self.subceed = None;
                        Some(VadTransition::Stopped)
                    } else {
                        self.subceed = Some(countdown - 1);
                        None
                    }
                } else {
                    // Between the offsets: recovering from a hiccup
                    self.subceed = Some((countdown + 1).min(self.config.stop_countdown));
                    None
                }
            }
            None => {
                if loud {
                    self.exceed += 1;
                } else {
                    self.exceed = 0;
                }

                if self.exceed > self.config.exceed_threshold {
                    self.exceed = 0;
                    self.subceed = Some(self.config.stop_countdown);
                    Some(VadTransition::Started)
                } else {
                    None
                }
            }
        }
    }
}
