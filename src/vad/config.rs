//! Voice activity detector configuration

use std::time::Duration;

/// Tuning constants for the voice activity detector
///
/// Levels are on a 0..=100 scale as reported by the capture pipeline.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// How often the mic level is sampled
    pub sample_period: Duration,

    /// Number of recent quiet samples kept for background estimation
    pub window: usize,

    /// Levels at or above this are assumed to be speech and excluded
    /// from the background window
    pub noise_ceiling: u32,

    /// Offset above background that counts as talking
    pub silence_offset: u32,

    /// Offset above background below which a sample counts as quiet
    /// while a speaking episode winds down
    pub subceed_offset: u32,

    /// Consecutive loud samples required (exceeded strictly) before a
    /// speaking-started signal fires
    pub exceed_threshold: u32,

    /// Countdown of quiet samples before a speaking-stopped signal fires
    pub stop_countdown: u32,

    /// Minimum gap between repeated speaking-started broadcasts
    pub resend_interval: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(150),
            window: 64,
            noise_ceiling: 20,
            silence_offset: 10,
            subceed_offset: 5,
            exceed_threshold: 2,
            stop_countdown: 20, // ~3s of quiet at the default sample period
            resend_interval: Duration::from_secs(2),
        }
    }
}

impl VadConfig {
    /// Set the sample period
    pub fn sample_period(mut self, period: Duration) -> Self {
        self.sample_period = period;
        self
    }

    /// Set the background window size
    pub fn window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Set the noise ceiling
    pub fn noise_ceiling(mut self, ceiling: u32) -> Self {
        self.noise_ceiling = ceiling;
        self
    }

    /// Set the silence offset
    pub fn silence_offset(mut self, offset: u32) -> Self {
        self.silence_offset = offset;
        self
    }

    /// Set the subceed offset
    pub fn subceed_offset(mut self, offset: u32) -> Self {
        self.subceed_offset = offset;
        self
    }

    /// Set the exceed threshold
    pub fn exceed_threshold(mut self, threshold: u32) -> Self {
        self.exceed_threshold = threshold;
        self
    }

    /// Set the stop countdown
    pub fn stop_countdown(mut self, countdown: u32) -> Self {
        self.stop_countdown = countdown.max(1);
        self
    }

    /// Set the resend interval
    pub fn resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VadConfig::default();

        assert_eq!(config.sample_period, Duration::from_millis(150));
        assert_eq!(config.window, 64);
        assert_eq!(config.noise_ceiling, 20);
        assert_eq!(config.silence_offset, 10);
        assert_eq!(config.subceed_offset, 5);
        assert_eq!(config.exceed_threshold, 2);
        assert_eq!(config.stop_countdown, 20);
        assert_eq!(config.resend_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_chaining() {
        let config = VadConfig::default()
            .sample_period(Duration::from_millis(50))
            .window(16)
            .noise_ceiling(30)
            .exceed_threshold(4)
            .stop_countdown(10);

        assert_eq!(config.sample_period, Duration::from_millis(50));
        assert_eq!(config.window, 16);
        assert_eq!(config.noise_ceiling, 30);
        assert_eq!(config.exceed_threshold, 4);
        assert_eq!(config.stop_countdown, 10);
    }

    #[test]
    fn test_builder_floors() {
        // Window and countdown of zero would wedge the detector
        let config = VadConfig::default().window(0).stop_countdown(0);

        assert_eq!(config.window, 1);
        assert_eq!(config.stop_countdown, 1);
    }
}
