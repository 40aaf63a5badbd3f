//! Voice activity detection and priority signaling
//!
//! This module provides:
//! - Level-based speaking/silence classification with hysteresis
//! - The `VAD:`/`NOVAD:` side-channel wire codec
//! - Bounded recency sets of recently-speaking peers that bias
//!   subscription ranking

pub mod config;
pub mod detector;
pub mod priority;
pub mod signal;

pub use config::VadConfig;
pub use detector::{VadTransition, VoiceDetector};
pub use priority::PrioritySignals;
pub use signal::VadSignal;
