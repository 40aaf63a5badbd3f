//! Wire codec for voice-activity signals
//!
//! Signals travel over the external messaging side-channel as a two-field
//! string `TAG:participantId` with TAG being `VAD` or `NOVAD`. Parsing splits
//! on the first separator only, so participant IDs may themselves contain
//! colons.

use crate::types::ParticipantId;

const SPEAKING_TAG: &str = "VAD";
const SILENT_TAG: &str = "NOVAD";

/// A speaking-state transition broadcast between peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VadSignal {
    /// The participant started (or is still) speaking
    Speaking(ParticipantId),
    /// The participant stopped speaking
    Silent(ParticipantId),
}

impl VadSignal {
    /// Parse a signal from side-channel text
    ///
    /// Returns `None` for unrelated messages; the side-channel may carry
    /// other traffic.
    pub fn parse(text: &str) -> Option<VadSignal> {
        let (tag, id) = text.split_once(':')?;
        if id.is_empty() {
            return None;
        }

        match tag {
            SPEAKING_TAG => Some(VadSignal::Speaking(ParticipantId::new(id))),
            SILENT_TAG => Some(VadSignal::Silent(ParticipantId::new(id))),
            _ => None,
        }
    }

    /// Encode the signal for the side-channel
    pub fn encode(&self) -> String {
        match self {
            VadSignal::Speaking(id) => format!("{}:{}", SPEAKING_TAG, id),
            VadSignal::Silent(id) => format!("{}:{}", SILENT_TAG, id),
        }
    }

    /// The participant this signal refers to
    pub fn participant(&self) -> &ParticipantId {
        match self {
            VadSignal::Speaking(id) | VadSignal::Silent(id) => id,
        }
    }
}
