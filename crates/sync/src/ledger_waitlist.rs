//! Syncs blocked on the ledger catching up.

use std::collections::BTreeMap;
use vsync_types::{Hash, LedgerHeader};

/// Sync ids waiting for the ledger to commit up to a header.
///
/// Ordered by the ledger's header ordering so every entry the ledger has
/// reached can be drained with one range split.
#[derive(Debug, Default)]
pub struct LedgerSyncWaitlist {
    waiting: BTreeMap<LedgerHeader, Vec<Hash>>,
}

impl LedgerSyncWaitlist {
    /// Create an empty waitlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `sync_id` wait for the ledger to reach `header`.
    pub fn register(&mut self, header: LedgerHeader, sync_id: Hash) {
        self.waiting.entry(header).or_default().push(sync_id);
    }

    /// Remove and return every entry at or below `tail`, lowest first.
    pub fn drain_up_to(&mut self, tail: &LedgerHeader) -> Vec<(LedgerHeader, Vec<Hash>)> {
        let mut above = self.waiting.split_off(tail);
        let at_tail = above.remove_entry(tail);
        let reached = std::mem::replace(&mut self.waiting, above);
        reached.into_iter().chain(at_tail).collect()
    }

    /// Check whether a sync is waiting on any header.
    pub fn contains(&self, sync_id: &Hash) -> bool {
        self.waiting.values().any(|ids| ids.contains(sync_id))
    }

    /// Number of distinct headers waited on.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Check whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
