use std::time::Duration;

use rand::Rng;

use crate::config::settings::BackoffConfig;

/// Capped exponential backoff with jitter.
///
/// Attempt `n` sleeps somewhere in `[base(n), min(2 * base(n), max)]` where
/// `base(n) = min * 2^n` capped at `max`. The upper bound of one attempt is the
/// lower bound of the next, so consecutive delays never shrink no matter what
/// the jitter draws. Callers own the attempt counter.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        // max below min would make the ceiling meaningless
        let max = max.max(min);
        Self { min, max }
    }

    /// Lower bound of the delay for `attempt` (0-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.min
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Jittered delay for `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let lower = self.base_delay(attempt);
        let upper = lower.saturating_mul(2).min(self.max);
        if upper <= lower {
            return lower;
        }
        let lower_ms = lower.as_millis() as u64;
        let upper_ms = upper.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lower_ms..=upper_ms))
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(cfg: &BackoffConfig) -> Self {
        Backoff::new(
            Duration::from_millis(cfg.min_backoff_ms),
            Duration::from_millis(cfg.max_backoff_ms),
        )
    }
}
