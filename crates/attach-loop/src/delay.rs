//! Random delay between attach and detach

use rand::Rng;
use std::time::Duration;

/// Uniform delay in whole seconds over `[0, max_delay]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    max_delay: u64,
}

impl DelayPolicy {
    pub fn new(max_delay: u64) -> Self {
        Self { max_delay }
    }

    pub fn max_delay(&self) -> u64 {
        self.max_delay
    }

    /// Draw the number of seconds to wait, inclusive of both bounds
    ///
    /// Returns `None` when no draw is made (`max_delay == 0`).
    pub fn draw_secs<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u64> {
        if self.max_delay == 0 {
            return None;
        }
        Some(rng.random_range(0..=self.max_delay))
    }

    /// Sample the delay to sleep, `None` meaning no sleep at all
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        match self.draw_secs(rng) {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }
}
