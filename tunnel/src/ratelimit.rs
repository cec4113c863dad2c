// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Token-bucket gating for high-frequency log sites.
//!
//! Receive-lookup misses and ECN drops are expected, per-packet
//! conditions; their warnings must not flood the log.  Each such site
//! shares a [`RateLimiter`] and logs only when [`RateLimiter::check`]
//! grants a token.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// A token bucket granting up to `burst` events per `per` interval.
pub struct RateLimiter {
    burst: u32,
    token_interval: Duration,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// A limiter granting `burst` events per `per`, starting full.
    ///
    /// # Panics
    ///
    /// Panics if `burst` is zero.
    #[must_use]
    pub fn new(burst: u32, per: Duration) -> RateLimiter {
        assert!(burst > 0, "a zero-rate limiter would never log");
        RateLimiter {
            burst,
            token_interval: per / burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take a token if one is available.  Returns true when the caller
    /// may proceed (log), false when the event should be suppressed.
    #[must_use]
    pub fn check(&self) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        if elapsed >= self.token_interval {
            let refill = u32::try_from(elapsed.as_nanos() / self.token_interval.as_nanos())
                .unwrap_or(u32::MAX);
            state.tokens = state.tokens.saturating_add(refill).min(self.burst);
            state.last_refill = now;
        }
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::RateLimiter;
    use std::time::Duration;

    #[test]
    fn burst_then_suppression() {
        let limiter = RateLimiter::new(2, Duration::from_secs(3600));
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(4, Duration::from_millis(40));
        for _ in 0..4 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check());
    }
}
