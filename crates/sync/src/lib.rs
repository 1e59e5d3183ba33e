//! BFT vertex synchronization state machine.
//!
//! This crate reconciles a local vertex store with QCs observed on the
//! network. It can be used for both simulation and production.
//!
//! # Architecture
//!
//! The sync state machine processes events synchronously:
//!
//! - `Event::SyncToQc` / `Event::ViewQuorumReached` → Absorb the QC or start fetching
//! - `Event::GetVerticesResponseReceived` → Walk back ancestors or wait for the ledger
//! - `Event::GetVerticesErrorResponseReceived` → Chase the peer's higher QC
//! - `Event::VertexRequestTimeout` → Retry against another candidate peer
//! - `Event::LedgerUpdated` → Rebuild the store on synced committed state
//! - `Event::GetVerticesRequestReceived` → Serve vertices to a syncing peer
//!
//! All I/O is performed by the runner via returned `Action`s.

mod config;
mod counters;
mod ledger_waitlist;
mod rate_limiter;
mod request_tracker;
mod state;
mod sync_state;

pub use config::{ConfigError, RateLimitConfig, SyncConfig};
pub use counters::SyncCounters;
pub use ledger_waitlist::LedgerSyncWaitlist;
pub use rate_limiter::SyncRequestRateLimiter;
pub use request_tracker::{RequestTracker, SendOutcome, SyncRequestState};
pub use state::BftSync;
pub use sync_state::{SyncStage, SyncState, SyncStateTracker};
