//! Services the runner drives on behalf of the sync state machine.
//!
//! All calls are fire-and-forget. Results come back to the runner as events.

use std::sync::Arc;
use vsync_core::OutboundMessage;
use vsync_messages::LocalSyncRequest;
use vsync_types::{HighQc, ValidatorId};

/// Point-to-point delivery to other validators.
pub trait Network: Send + Sync + 'static {
    /// Send a message to one validator.
    fn send(&self, to: ValidatorId, message: OutboundMessage);
}

/// Consumer of high QC progress.
pub trait Pacemaker: Send + Sync + 'static {
    /// The local high QC advanced.
    fn process_high_qc(&self, high_qc: HighQc);
}

/// Ledger sync subsystem.
pub trait LedgerSync: Send + Sync + 'static {
    /// Start syncing the ledger towards a committed proof.
    ///
    /// Progress is reported back as `Event::LedgerUpdated`.
    fn request_sync(&self, request: LocalSyncRequest);
}

/// The collaborators a runner executes actions against.
#[derive(Clone)]
pub struct Collaborators {
    /// Outbound vertices requests and responses.
    pub network: Arc<dyn Network>,

    /// Receives every high QC the sync advances to.
    pub pacemaker: Arc<dyn Pacemaker>,

    /// Receives committed-sync ledger requests.
    pub ledger: Arc<dyn LedgerSync>,
}
