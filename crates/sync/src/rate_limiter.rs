//! Rate limiting for outbound vertices requests.
//!
//! A single token bucket shared by every sync attempt. Requests that find the
//! bucket empty are dropped rather than queued; the request timeout retries
//! them later.

use crate::RateLimitConfig;
use parking_lot::Mutex;
use std::time::Duration;

/// Token bucket refilled from a caller-supplied clock.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of tokens available.
    tokens: f64,
    /// Maximum tokens (bucket capacity).
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Time of the last refill.
    last_update: Duration,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_rate: refill_rate as f64,
            last_update: Duration::ZERO,
        }
    }

    /// Try to consume one token. Returns true if allowed, false if rate limited.
    fn try_consume(&mut self, now: Duration) -> bool {
        // Clocks handed in out of order never refill backwards
        let elapsed = now.saturating_sub(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_update = self.last_update.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Limiter for newly dispatched vertices requests.
///
/// Safe to share between sync instances behind an `Arc`.
#[derive(Debug)]
pub struct SyncRequestRateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl SyncRequestRateLimiter {
    /// Create a new limiter starting with a full bucket.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.burst, config.requests_per_sec)),
        }
    }

    /// Take a token if one is available at time `now`.
    pub fn try_acquire(&self, now: Duration) -> bool {
        self.bucket.lock().try_consume(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config(requests_per_sec: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_sec,
            burst,
        }
    }

    #[test]
    fn test_burst_then_limited() {
        let limiter = SyncRequestRateLimiter::new(&config(10, 3));

        for _ in 0..3 {
            assert!(limiter.try_acquire(Duration::ZERO), "Should allow burst");
        }
        assert!(
            !limiter.try_acquire(Duration::ZERO),
            "Should rate limit after burst"
        );
    }

    #[test]
    fn test_refills_over_time() {
        let limiter = SyncRequestRateLimiter::new(&config(10, 1));

        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::from_millis(50)));

        // 100ms at 10/s refills one token
        assert!(limiter.try_acquire(Duration::from_millis(150)));
    }

    #[test]
    fn test_refill_capped_at_burst() {
        let limiter = SyncRequestRateLimiter::new(&config(100, 2));

        assert!(limiter.try_acquire(Duration::from_secs(10)));
        assert!(limiter.try_acquire(Duration::from_secs(10)));
        assert!(!limiter.try_acquire(Duration::from_secs(10)));
    }

    #[test]
    fn test_shared_between_owners() {
        let limiter = Arc::new(SyncRequestRateLimiter::new(&config(1, 1)));
        let other = Arc::clone(&limiter);

        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!other.try_acquire(Duration::ZERO));
    }
}
