//! Logical sync attempts and their bookkeeping.

use indexmap::IndexSet;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use vsync_types::{BftHeader, Hash, HighQc, LedgerProof, ValidatorId, VerifiedVertex};

/// Progress of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Created, no request sent yet.
    Preparing,

    /// Fetching the vertices that end at the committed vertex.
    GetCommittedVertices,

    /// Walking back from the QC's vertex one ancestor at a time.
    GetQcVertices,

    /// Waiting for the ledger to reach the committed state.
    LedgerSync,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Preparing => write!(f, "preparing"),
            SyncStage::GetCommittedVertices => write!(f, "get_committed_vertices"),
            SyncStage::GetQcVertices => write!(f, "get_qc_vertices"),
            SyncStage::LedgerSync => write!(f, "ledger_sync"),
        }
    }
}

/// One attempt to bring local state up to a target high QC.
#[derive(Debug, Clone)]
pub struct SyncState {
    /// Id of the vertex the target's highest QC certifies.
    local_sync_id: Hash,
    high_qc: HighQc,
    committed_header: BftHeader,
    committed_proof: LedgerProof,
    /// Node that triggered the sync.
    author: ValidatorId,
    /// Other nodes that asked for the same target while vertices were being
    /// walked back, in arrival order.
    joined_authors: IndexSet<ValidatorId>,
    stage: SyncStage,
    /// Vertices fetched so far.
    fetched: VecDeque<VerifiedVertex>,
}

impl SyncState {
    /// Start a sync to `high_qc` triggered by `author`.
    pub fn new(high_qc: HighQc, author: ValidatorId) -> Self {
        let local_sync_id = high_qc.highest_qc().proposed().vertex_id;
        let (committed_header, committed_proof) = high_qc.committed_header_and_proof();
        Self {
            local_sync_id,
            high_qc,
            committed_header,
            committed_proof,
            author,
            joined_authors: IndexSet::new(),
            stage: SyncStage::Preparing,
            fetched: VecDeque::new(),
        }
    }

    /// Sync identifier.
    pub fn id(&self) -> Hash {
        self.local_sync_id
    }

    /// Target progress.
    pub fn high_qc(&self) -> &HighQc {
        &self.high_qc
    }

    /// Header committed by the target's highest committed QC.
    pub fn committed_header(&self) -> &BftHeader {
        &self.committed_header
    }

    /// Ledger proof for the committed header.
    pub fn committed_proof(&self) -> &LedgerProof {
        &self.committed_proof
    }

    /// Node that triggered the sync.
    pub fn author(&self) -> ValidatorId {
        self.author
    }

    /// Nodes that asked for the same target after the sync started.
    pub fn joined_authors(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.joined_authors.iter().copied()
    }

    /// Current stage.
    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    /// Move to a new stage.
    pub fn set_stage(&mut self, stage: SyncStage) {
        self.stage = stage;
    }

    /// Record another node asking for the same target.
    ///
    /// Only kept while walking back QC vertices, where it becomes a candidate
    /// for later single-ancestor requests. Returns whether it was recorded.
    pub fn join(&mut self, author: ValidatorId) -> bool {
        if self.stage != SyncStage::GetQcVertices || author == self.author {
            return false;
        }
        self.joined_authors.insert(author)
    }

    /// Vertices fetched so far.
    pub fn fetched(&self) -> &VecDeque<VerifiedVertex> {
        &self.fetched
    }

    /// Record an older ancestor ahead of everything fetched so far.
    pub fn prepend_fetched(&mut self, vertex: VerifiedVertex) {
        self.fetched.push_front(vertex);
    }

    /// Record a batch of vertices after everything fetched so far.
    pub fn append_fetched(&mut self, vertices: impl IntoIterator<Item = VerifiedVertex>) {
        self.fetched.extend(vertices);
    }

    /// Fetched vertices sorted by view, oldest first.
    pub fn fetched_by_view(&self) -> Vec<VerifiedVertex> {
        let mut vertices: Vec<_> = self.fetched.iter().cloned().collect();
        vertices.sort_by_key(|vertex| vertex.view());
        vertices
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SyncState{{id={} view={} stage={} fetched={}}}",
            self.local_sync_id,
            self.high_qc.highest_qc().view(),
            self.stage,
            self.fetched.len()
        )
    }
}

/// In-flight sync attempts by id.
#[derive(Debug, Default)]
pub struct SyncStateTracker {
    states: HashMap<Hash, SyncState>,
}

impl SyncStateTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new sync, replacing any sync with the same id.
    pub fn insert(&mut self, state: SyncState) {
        self.states.insert(state.id(), state);
    }

    /// Check whether a sync is in flight.
    pub fn contains(&self, id: &Hash) -> bool {
        self.states.contains_key(id)
    }

    /// Get a sync.
    pub fn get(&self, id: &Hash) -> Option<&SyncState> {
        self.states.get(id)
    }

    /// Get a sync for modification.
    pub fn get_mut(&mut self, id: &Hash) -> Option<&mut SyncState> {
        self.states.get_mut(id)
    }

    /// Stop tracking a sync.
    pub fn remove(&mut self, id: &Hash) -> Option<SyncState> {
        self.states.remove(id)
    }

    /// Keep only the syncs matching `keep`, returning how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&SyncState) -> bool) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| keep(state));
        before - self.states.len()
    }

    /// Ids of every tracked sync.
    pub fn ids(&self) -> impl Iterator<Item = &Hash> {
        self.states.keys()
    }

    /// Number of tracked syncs.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check whether nothing is being synced.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
