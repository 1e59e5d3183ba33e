//! Per-peer rate limiting for inbound vertices requests.
//!
//! Uses a token bucket algorithm to limit the rate of requests per peer.
//! Known validators get higher limits than unknown peers.

use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use vsync_types::ValidatorId;

/// Configuration for inbound rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InboundRateLimitConfig {
    /// Maximum requests per second for known validators.
    pub validator_requests_per_sec: u32,
    /// Maximum requests per second for unknown peers.
    pub unknown_peer_requests_per_sec: u32,
    /// Maximum burst size (bucket capacity) for validators.
    pub validator_burst: u32,
    /// Maximum burst size (bucket capacity) for unknown peers.
    pub unknown_peer_burst: u32,
    /// How long to track a peer after their last request (cleanup threshold).
    #[serde(rename = "peer_ttl_secs", deserialize_with = "duration_secs")]
    pub peer_ttl: Duration,
}

impl Default for InboundRateLimitConfig {
    fn default() -> Self {
        Self {
            // A syncing validator walks back one vertex per request
            validator_requests_per_sec: 200,
            validator_burst: 50,
            unknown_peer_requests_per_sec: 10,
            unknown_peer_burst: 20,
            peer_ttl: Duration::from_secs(300),
        }
    }
}

fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Token bucket state for a single peer.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of tokens available.
    tokens: f64,
    /// Maximum tokens (bucket capacity).
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last time we updated the bucket.
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_rate: refill_rate as f64,
            last_update: now,
        }
    }

    /// Try to consume one token. Returns true if allowed, false if rate limited.
    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_update) > ttl
    }
}

/// Per-peer limiter for vertices requests served to other nodes.
#[derive(Debug)]
pub struct InboundRateLimiter {
    config: InboundRateLimitConfig,
    validators: HashSet<ValidatorId>,
    buckets: HashMap<ValidatorId, TokenBucket>,
    last_cleanup: Instant,
}

impl InboundRateLimiter {
    /// Create a new limiter treating `validators` as known validators.
    pub fn new(
        config: InboundRateLimitConfig,
        validators: impl IntoIterator<Item = ValidatorId>,
    ) -> Self {
        Self {
            config,
            validators: validators.into_iter().collect(),
            buckets: HashMap::new(),
            last_cleanup: Instant::now(),
        }
    }

    /// Check if a request from the given peer should be served.
    pub fn check_request(&mut self, peer: ValidatorId) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_cleanup) > Duration::from_secs(60) {
            self.cleanup(now);
        }

        let (burst, rate) = if self.validators.contains(&peer) {
            (
                self.config.validator_burst,
                self.config.validator_requests_per_sec,
            )
        } else {
            (
                self.config.unknown_peer_burst,
                self.config.unknown_peer_requests_per_sec,
            )
        };

        self.buckets
            .entry(peer)
            .or_insert_with(|| TokenBucket::new(burst, rate, now))
            .try_consume(now)
    }

    /// Remove stale peer entries to prevent unbounded memory growth.
    fn cleanup(&mut self, now: Instant) {
        let ttl = self.config.peer_ttl;
        self.buckets.retain(|_, bucket| !bucket.is_stale(now, ttl));
        self.last_cleanup = now;
    }

    /// Get the number of tracked peers.
    pub fn tracked_peer_count(&self) -> usize {
        self.buckets.len()
    }
}
