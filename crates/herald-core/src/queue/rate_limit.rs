//! Per-channel throughput limiting.
//!
//! Provider quotas cap sends per minute for each channel class. The limiter
//! never rejects work: a denied acquire reports when the window next opens,
//! and the queue parks the task until then.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window counter: at most `limit` acquisitions per `window`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    grants: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            grants: VecDeque::new(),
        }
    }

    /// Limit per minute, the unit provider quotas are stated in.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Try to take one send slot at `now`. On denial, returns the instant at
    /// which a slot frees up.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Instant> {
        while let Some(&front) = self.grants.front() {
            if now.duration_since(front) >= self.window {
                self.grants.pop_front();
            } else {
                break;
            }
        }

        if (self.grants.len() as u32) < self.limit {
            self.grants.push_back(now);
            Ok(())
        } else {
            // Front is the oldest grant still inside the window. A limit of
            // zero admits nothing; report a full window's wait.
            match self.grants.front() {
                Some(&oldest) => Err(oldest + self.window),
                None => Err(now + self.window),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_up_to_the_limit() {
        let mut limiter = RateLimiter::per_minute(3);
        let now = Instant::now();

        assert!(limiter.try_acquire(now).is_ok());
        assert!(limiter.try_acquire(now).is_ok());
        assert!(limiter.try_acquire(now).is_ok());
        assert!(limiter.try_acquire(now).is_err());
    }

    #[test]
    fn denial_reports_when_the_window_opens() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        limiter.try_acquire(start).unwrap();
        let retry_at = limiter.try_acquire(start).unwrap_err();
        assert_eq!(retry_at, start + Duration::from_secs(60));
    }

    #[test]
    fn slots_free_up_as_the_window_slides() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.try_acquire(start).unwrap();
        limiter.try_acquire(start + Duration::from_secs(30)).unwrap();
        assert!(limiter.try_acquire(start + Duration::from_secs(40)).is_err());

        // First grant has aged out.
        assert!(limiter.try_acquire(start + Duration::from_secs(61)).is_ok());
    }
}
