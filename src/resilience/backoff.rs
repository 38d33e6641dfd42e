//! Exponential backoff with jitter between retry attempts.

use std::time::Duration;

use rand::Rng;

/// Delay schedule for caller-side retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `attempt` (1-based). Zero for attempt 0.
    ///
    /// The base doubles per attempt up to the cap, plus up to 10% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..0.1))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(2))
    }
}
