//! Caller request tracking.

/// Opaque identifier for correlating a sync request with its result.
///
/// The runner maintains a map of `RequestId` -> reply channel, which keeps
/// async response handling out of the sync state machine.
///
/// ```ignore
/// let request_id = RequestId(self.next_request_id);
/// self.next_request_id += 1;
///
/// let (reply_tx, reply_rx) = oneshot::channel();
/// self.pending.insert(request_id, reply_tx);
/// self.handle(Event::SyncToQc { high_qc, author, request_id });
///
/// // Later, on Action::EmitSyncResult:
/// if let Some(tx) = self.pending.remove(&request_id) {
///     let _ = tx.send(result);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new request ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync-req-{}", self.0)
    }
}
