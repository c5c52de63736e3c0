//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Backoff schedule for failed tasks.
///
/// The delivery contract uses a fixed 60 s delay between attempts, which is
/// the default here (multiplier 1.0). A multiplier above 1.0 turns the same
/// policy into exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Growth factor applied per subsequent retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
        }
    }

    /// Delay before the next retry, given the attempts already made
    /// (1-indexed): `base_delay * multiplier^(attempts - 1)`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}
