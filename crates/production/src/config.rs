//! Runner configuration.

use crate::network::InboundRateLimitConfig;
use crate::RunnerError;
use serde::Deserialize;
use vsync_bft_sync::SyncConfig;

/// Configuration for a [`SyncRunner`](crate::SyncRunner).
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```toml
/// mailbox_capacity = 4096
///
/// [sync]
/// request_patience_ms = 500
///
/// [sync.rate_limit]
/// requests_per_sec = 100
///
/// [inbound_rate_limit]
/// unknown_peer_burst = 5
/// peer_ttl_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Messages the runner's mailbox holds before senders wait.
    pub mailbox_capacity: usize,

    /// Sync state machine configuration.
    pub sync: SyncConfig,

    /// Limits on vertices requests served to peers.
    pub inbound_rate_limit: InboundRateLimitConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            sync: SyncConfig::default(),
            inbound_rate_limit: InboundRateLimitConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml(source: &str) -> Result<Self, RunnerError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the sync state machine configuration.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Set the inbound rate limits.
    pub fn with_inbound_rate_limit(mut self, limits: InboundRateLimitConfig) -> Self {
        self.inbound_rate_limit = limits;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.mailbox_capacity == 0 {
            return Err(RunnerError::ZeroMailbox);
        }
        self.sync.validate()?;
        Ok(())
    }
}
