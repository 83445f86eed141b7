//! Reconnection policy for channel clients.
//!
//! When the WebSocket drops, clients retry with bounded exponential backoff.
//! Once the attempt budget is spent they stop retrying and poll the history
//! endpoint instead, which serves every message the store accepted while
//! the channel was down.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 0-based attempt, doubling from
    /// `initial_delay` and capped at `max_delay`. `None` once the attempt
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let delay = self
            .initial_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }

    /// The full bounded delay schedule.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).filter_map(move |attempt| self.delay_for(attempt))
    }
}
