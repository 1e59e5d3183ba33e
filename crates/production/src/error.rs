//! Runner errors.

use thiserror::Error;
use vsync_bft_sync::ConfigError;

/// Errors from configuring or talking to a sync runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Invalid sync configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Mailbox capacity must be non-zero")]
    ZeroMailbox,

    #[error("Sync runner has stopped")]
    MailboxClosed,

    #[error("Sync runner dropped the reply")]
    ReplyDropped,
}
