//! Inputs to the sync state machine.

use crate::RequestId;
use vsync_messages::{
    GetVerticesErrorResponse, GetVerticesRequest, GetVerticesResponse, LedgerUpdate,
};
use vsync_types::{HighQc, ValidatorId, ViewQuorumReached};

/// All possible inputs to the sync state machine.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Consensus
    // ═══════════════════════════════════════════════════════════════════════
    /// A QC or TC was formed from local votes.
    ViewQuorumReached {
        /// The formed certificate and the author of the completing vote.
        quorum: ViewQuorumReached,
    },

    /// Sync local state up to `high_qc`.
    ///
    /// The result is returned via `Action::EmitSyncResult` with the same
    /// `request_id`.
    SyncToQc {
        /// Target consensus progress.
        high_qc: HighQc,
        /// Node the QC came from.
        author: Option<ValidatorId>,
        /// Correlates the eventual result with the caller.
        request_id: RequestId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// A peer answered one of our vertices requests.
    GetVerticesResponseReceived {
        /// Responding peer.
        from: ValidatorId,
        /// The response.
        response: GetVerticesResponse,
    },

    /// A peer could not serve one of our vertices requests.
    GetVerticesErrorResponseReceived {
        /// Responding peer.
        from: ValidatorId,
        /// The error response.
        response: GetVerticesErrorResponse,
    },

    /// A peer asked us for vertices.
    GetVerticesRequestReceived {
        /// Requesting peer.
        from: ValidatorId,
        /// The request.
        request: GetVerticesRequest,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Patience for a vertices request ran out.
    VertexRequestTimeout {
        /// The request the timer was armed for.
        request: GetVerticesRequest,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Ledger
    // ═══════════════════════════════════════════════════════════════════════
    /// The ledger committed up to a new tail.
    LedgerUpdated {
        /// The new tail.
        update: LedgerUpdate,
    },
}

impl Event {
    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ViewQuorumReached { .. } => "ViewQuorumReached",
            Event::SyncToQc { .. } => "SyncToQc",
            Event::GetVerticesResponseReceived { .. } => "GetVerticesResponseReceived",
            Event::GetVerticesErrorResponseReceived { .. } => "GetVerticesErrorResponseReceived",
            Event::GetVerticesRequestReceived { .. } => "GetVerticesRequestReceived",
            Event::VertexRequestTimeout { .. } => "VertexRequestTimeout",
            Event::LedgerUpdated { .. } => "LedgerUpdated",
        }
    }

    /// Check if this event came from a peer over the network.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Event::GetVerticesResponseReceived { .. }
                | Event::GetVerticesErrorResponseReceived { .. }
                | Event::GetVerticesRequestReceived { .. }
        )
    }
}
