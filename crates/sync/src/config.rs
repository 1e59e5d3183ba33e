//! Sync configuration.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from validating a [`SyncConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Requests would time out immediately.
    #[error("request patience must be non-zero")]
    ZeroPatience,

    /// The outbound limiter would never refill.
    #[error("rate limit must allow at least one request per second")]
    ZeroRate,

    /// The outbound limiter could never hold a token.
    #[error("rate limit burst must be at least one")]
    ZeroBurst,
}

/// Token bucket settings for outbound vertices requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub requests_per_sec: u32,

    /// Bucket capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_sec: 50,
            burst: 10,
        }
    }
}

/// Configuration for the vertex sync protocol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long to wait for a vertices response before retrying elsewhere.
    #[serde(rename = "request_patience_ms", with = "duration_ms")]
    pub request_patience: Duration,

    /// Limit on newly dispatched vertices requests.
    pub rate_limit: RateLimitConfig,

    /// Seed for choosing retry peers.
    pub rng_seed: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_patience: Duration::from_millis(200),
            rate_limit: RateLimitConfig::default(),
            rng_seed: 0,
        }
    }
}

impl SyncConfig {
    /// Set the request patience.
    pub fn with_request_patience(mut self, patience: Duration) -> Self {
        self.request_patience = patience;
        self
    }

    /// Set the outbound rate limit.
    pub fn with_rate_limit(mut self, requests_per_sec: u32, burst: u32) -> Self {
        self.rate_limit = RateLimitConfig {
            requests_per_sec,
            burst,
        };
        self
    }

    /// Set the retry peer seed.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_patience.is_zero() {
            return Err(ConfigError::ZeroPatience);
        }
        if self.rate_limit.requests_per_sec == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        Ok(())
    }
}

/// Durations as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert_eq!(config.request_patience, Duration::from_millis(200));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = SyncConfig::default().with_request_patience(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPatience));

        let config = SyncConfig::default().with_rate_limit(0, 5);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRate));

        let config = SyncConfig::default().with_rate_limit(5, 0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBurst));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            request_patience_ms = 500

            [rate_limit]
            burst = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.request_patience, Duration::from_millis(500));
        assert_eq!(config.rate_limit.burst, 3);
        assert_eq!(config.rate_limit.requests_per_sec, 50);
        assert_eq!(config.rng_seed, 0);
    }
}
