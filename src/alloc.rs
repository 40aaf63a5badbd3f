//! Host channel allocation
//!
//! Rooms backed by more than one transport channel cap how many publishers
//! each channel carries. The allocator scans channels in a fixed order and
//! settles on the first one with a free publisher slot; the choice is sticky
//! for the rest of the session.

/// Error type for channel allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Every channel is at its publisher capacity
    Exhausted,
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocError::Exhausted => write!(f, "All publish channels at capacity"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Picks and remembers the channel the local participant publishes into
#[derive(Debug)]
pub struct HostAllocator {
    /// Publisher capacity per channel
    capacity: usize,
    /// Channel chosen for this session, once role elevation succeeded
    chosen: Option<usize>,
}

impl HostAllocator {
    /// Create an allocator with the given per-channel publisher capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            chosen: None,
        }
    }

    /// The channel assigned to this session, if any
    pub fn chosen(&self) -> Option<usize> {
        self.chosen
    }

    /// Pick a channel for publishing given current per-channel occupancy
    ///
    /// Returns the sticky choice if one was already committed. Exhaustion is
    /// not fatal; the caller retries on the next publish attempt.
    pub fn pick(&self, occupancy: &[usize]) -> Result<usize, AllocError> {
        if let Some(channel) = self.chosen {
            return Ok(channel);
        }

        occupancy
            .iter()
            .position(|&count| count < self.capacity)
            .ok_or(AllocError::Exhausted)
    }

    /// Commit a channel after the transport role elevation succeeded
    ///
    /// The first committed channel wins; it is never reassigned mid-session.
    pub fn commit(&mut self, channel: usize) {
        if self.chosen.is_none() {
            self.chosen = Some(channel);
            tracing::info!(channel = channel, "Publish channel assigned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_open_channel_wins() {
        let alloc = HostAllocator::new(2);
        assert_eq!(alloc.pick(&[2, 1, 0]), Ok(1));
    }

    #[test]
    fn test_exhausted_when_all_full() {
        let alloc = HostAllocator::new(2);
        assert_eq!(alloc.pick(&[2, 2, 2]), Err(AllocError::Exhausted));
    }

    #[test]
    fn test_choice_is_sticky() {
        let mut alloc = HostAllocator::new(2);

        assert_eq!(alloc.pick(&[0, 0]), Ok(0));
        alloc.commit(0);

        // Channel 0 filling up does not move an assigned session
        assert_eq!(alloc.pick(&[2, 0]), Ok(0));
        assert_eq!(alloc.chosen(), Some(0));
    }

    #[test]
    fn test_commit_only_once() {
        let mut alloc = HostAllocator::new(4);

        alloc.commit(1);
        alloc.commit(2);

        assert_eq!(alloc.chosen(), Some(1));
    }

    #[test]
    fn test_exhaustion_retries_lazily() {
        let alloc = HostAllocator::new(1);

        assert_eq!(alloc.pick(&[1]), Err(AllocError::Exhausted));
        // A publisher left; the next attempt succeeds without any reset
        assert_eq!(alloc.pick(&[0]), Ok(0));
    }
}
