//! Outputs of the sync state machine.

use crate::{OutboundMessage, RequestId, TimerId};
use std::fmt;
use std::time::Duration;
use vsync_messages::LocalSyncRequest;
use vsync_types::{HighQc, ValidatorId};

/// Outcome of a request to sync up to a high QC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncResult {
    /// Local state already satisfies the QC.
    Synced,

    /// Vertices are being fetched to satisfy the QC.
    InProgress,

    /// The QC is stale or malformed and was discarded.
    Invalid,
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResult::Synced => write!(f, "synced"),
            SyncResult::InProgress => write!(f, "in_progress"),
            SyncResult::Invalid => write!(f, "invalid"),
        }
    }
}

/// All possible outputs from the sync state machine.
///
/// The runner executes actions in the order they are returned.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a message to a single validator.
    SendToValidator {
        /// Recipient.
        to: ValidatorId,
        /// The message.
        message: OutboundMessage,
    },

    /// Deliver a timer event after `duration`.
    SetTimer {
        /// Which timer.
        id: TimerId,
        /// Delay before the timer fires.
        duration: Duration,
    },

    /// Tell the pacemaker a higher QC is known locally.
    ProcessHighQc {
        /// The new high QC.
        high_qc: HighQc,
    },

    /// Ask the ledger sync subsystem to catch up to a committed proof.
    RequestLedgerSync {
        /// The ledger sync request.
        request: LocalSyncRequest,
    },

    /// Reply to an `Event::SyncToQc`.
    EmitSyncResult {
        /// Id from the originating event.
        request_id: RequestId,
        /// The outcome.
        result: SyncResult,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendToValidator { .. } => "SendToValidator",
            Action::SetTimer { .. } => "SetTimer",
            Action::ProcessHighQc { .. } => "ProcessHighQc",
            Action::RequestLedgerSync { .. } => "RequestLedgerSync",
            Action::EmitSyncResult { .. } => "EmitSyncResult",
        }
    }
}
