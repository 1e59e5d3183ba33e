//! Messages exchanged with the ledger sync subsystem.

use serde::{Deserialize, Serialize};
use vsync_types::{LedgerHeader, LedgerProof, ValidatorId};

/// Ask the ledger sync subsystem to catch the local ledger up to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSyncRequest {
    /// Committed proof to sync up to.
    pub target: LedgerProof,

    /// Peers known to hold the target state.
    pub target_nodes: Vec<ValidatorId>,
}

impl LocalSyncRequest {
    /// Create a new ledger sync request.
    pub fn new(target: LedgerProof, target_nodes: Vec<ValidatorId>) -> Self {
        Self {
            target,
            target_nodes,
        }
    }
}

/// The local ledger committed up to a new tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    /// Proof of the newest committed ledger state.
    pub tail: LedgerProof,
}

impl LedgerUpdate {
    /// Create a new ledger update.
    pub fn new(tail: LedgerProof) -> Self {
        Self { tail }
    }

    /// Header of the new tail.
    pub fn tail_header(&self) -> &LedgerHeader {
        self.tail.header()
    }
}
