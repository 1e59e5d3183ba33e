//! Sync counters.

/// Running totals of sync activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    /// Sync attempts abandoned because their request timed out.
    pub request_timeouts: u64,

    /// Vertices requests sent to a peer.
    pub requests_sent: u64,

    /// Vertices requests dropped by the rate limiter.
    pub requests_rate_limited: u64,

    /// Responses for requests that were no longer outstanding.
    pub unmatched_responses: u64,

    /// Ledger syncs requested.
    pub ledger_syncs_requested: u64,

    /// Vertex store rebuilds that were accepted.
    pub rebuilds: u64,
}
