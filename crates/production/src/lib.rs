//! Production runner for vertex sync.
//!
//! Wraps the synchronous [`BftSync`](vsync_bft_sync::BftSync) state machine
//! in a tokio task and executes its actions:
//!
//! - `Action::SendToValidator` → [`Network::send`]
//! - `Action::SetTimer` → a spawned sleep that posts `Event::VertexRequestTimeout`
//! - `Action::ProcessHighQc` → [`Pacemaker::process_high_qc`]
//! - `Action::RequestLedgerSync` → [`LedgerSync::request_sync`]
//! - `Action::EmitSyncResult` → the caller awaiting [`SyncHandle::sync_to_qc`]
//!
//! Inbound vertices requests are rate limited per peer before they reach the
//! state machine.

mod collaborators;
mod config;
mod error;
mod handle;
pub mod network;
mod runner;

pub use collaborators::{Collaborators, LedgerSync, Network, Pacemaker};
pub use config::RunnerConfig;
pub use error::RunnerError;
pub use handle::SyncHandle;
pub use runner::SyncRunner;
