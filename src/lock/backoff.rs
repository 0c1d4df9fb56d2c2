//! Jittered exponential backoff for lock polling.

use std::time::Duration;
use rand::Rng;

/// Delay schedule between attempts to take a contended lock.
///
/// Delays double from `base` up to `max`, each with up to 10% jitter so that
/// waiters on the same lock file do not poll in lockstep.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
}

impl PollBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            attempt: 0,
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// The delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay_ms = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(self.attempt))
            .min(self.max_ms);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_range = delay_ms / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(delay_ms + jitter)
    }
}
