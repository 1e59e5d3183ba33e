//! Vertex sync state machine.

use crate::{
    LedgerSyncWaitlist, RequestTracker, SendOutcome, SyncConfig, SyncCounters,
    SyncRequestRateLimiter, SyncRequestState, SyncStage, SyncState, SyncStateTracker,
};
use indexmap::IndexSet;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vsync_bft::{serve_vertices_request, VertexStore};
use vsync_core::{Action, Event, OutboundMessage, StateMachine, SyncResult};
use vsync_messages::{
    GetVerticesErrorResponse, GetVerticesRequest, GetVerticesResponse, LedgerUpdate,
    LocalSyncRequest,
};
use vsync_types::{
    Hash, HighQc, LedgerProof, ValidatorId, VertexChain, VertexStoreState, View,
    ViewQuorumReached, ViewVotingResult,
};

/// Vertices requested when syncing to a committed vertex: the committed
/// vertex's certified descendant and enough ancestors to rebuild a root.
const COMMITTED_WINDOW: usize = 3;

/// Vertices requested per step when walking back from a QC.
const QC_STEP: usize = 1;

/// Reconciles a local vertex store with QCs seen on the network.
///
/// Missing vertices are fetched from peers. When the missing ancestry is
/// older than the local root, the ledger is synced first and the store is
/// rebuilt on the fetched committed vertex.
///
/// Uses plain maps since it is owned by a single task.
pub struct BftSync<S: VertexStore> {
    /// Our validator id. Never asked for vertices.
    self_id: ValidatorId,

    /// Store being synced.
    store: S,

    /// Configuration.
    config: SyncConfig,

    /// Sync attempts in flight.
    sync_states: SyncStateTracker,

    /// Vertices requests in flight.
    requests: RequestTracker,

    /// Syncs waiting for the ledger.
    ledger_waitlist: LedgerSyncWaitlist,

    /// Proof of the latest committed ledger state.
    current_ledger_proof: LedgerProof,

    /// Picks retry peers.
    rng: ChaCha8Rng,

    /// Running totals.
    counters: SyncCounters,

    /// Peers that have shown us a QC, in first-seen order.
    progressed_peers: IndexSet<ValidatorId>,

    /// Current time.
    now: Duration,
}

impl<S: VertexStore> BftSync<S> {
    /// Create a new sync state machine with its own outbound rate limiter.
    pub fn new(
        self_id: ValidatorId,
        store: S,
        current_ledger_proof: LedgerProof,
        config: SyncConfig,
    ) -> Self {
        let limiter = Arc::new(SyncRequestRateLimiter::new(&config.rate_limit));
        Self::with_rate_limiter(self_id, store, current_ledger_proof, config, limiter)
    }

    /// Create a new sync state machine sharing an outbound rate limiter.
    pub fn with_rate_limiter(
        self_id: ValidatorId,
        store: S,
        current_ledger_proof: LedgerProof,
        config: SyncConfig,
        limiter: Arc<SyncRequestRateLimiter>,
    ) -> Self {
        Self {
            self_id,
            store,
            sync_states: SyncStateTracker::new(),
            requests: RequestTracker::new(limiter, config.request_patience),
            ledger_waitlist: LedgerSyncWaitlist::new(),
            current_ledger_proof,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            counters: SyncCounters::default(),
            progressed_peers: IndexSet::new(),
            now: Duration::ZERO,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// The store being synced.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The store being synced, for consensus to insert its own vertices.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Running totals.
    pub fn counters(&self) -> SyncCounters {
        self.counters
    }

    /// Peers that have shown us a QC, in first-seen order.
    pub fn progressed_peers(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.progressed_peers.iter().copied()
    }

    /// Proof of the latest committed ledger state.
    pub fn current_ledger_proof(&self) -> &LedgerProof {
        &self.current_ledger_proof
    }

    /// A sync in flight.
    pub fn sync_state(&self, sync_id: &Hash) -> Option<&SyncState> {
        self.sync_states.get(sync_id)
    }

    /// Number of syncs in flight.
    pub fn sync_count(&self) -> usize {
        self.sync_states.len()
    }

    /// An outstanding vertices request.
    pub fn request_state(&self, request: &GetVerticesRequest) -> Option<&SyncRequestState> {
        self.requests.get(request)
    }

    /// Number of outstanding vertices requests.
    pub fn outstanding_requests(&self) -> usize {
        self.requests.len()
    }

    /// Syncs waiting for the ledger.
    pub fn ledger_waitlist(&self) -> &LedgerSyncWaitlist {
        &self.ledger_waitlist
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Sync to QC
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bring local state up to at least `high_qc`.
    ///
    /// `author` is the node `high_qc` came from. It may only be omitted when
    /// the store can already absorb the QC.
    ///
    /// # Panics
    ///
    /// Panics if a sync has to start and `author` is `None`.
    pub fn sync_to_qc(
        &mut self,
        high_qc: HighQc,
        author: Option<ValidatorId>,
    ) -> (SyncResult, Vec<Action>) {
        if let Some(author) = author {
            self.progressed_peers.insert(author);
        }

        let qc = high_qc.highest_qc();
        let view = qc.view();

        if view < self.store.root().view() {
            trace!(
                view = view.0,
                root_view = self.store.root().view().0,
                "Ignoring QC behind root"
            );
            return (SyncResult::Invalid, vec![]);
        }

        if view < self.current_ledger_proof.view() {
            trace!(
                view = view.0,
                ledger_view = self.current_ledger_proof.view().0,
                "Ignoring QC behind ledger"
            );
            return (SyncResult::Invalid, vec![]);
        }

        if let Some(tc) = high_qc.highest_tc() {
            self.store.insert_timeout_certificate(tc.clone());
        }

        if self.store.add_qc(qc) {
            return (
                SyncResult::Synced,
                vec![Action::ProcessHighQc {
                    high_qc: self.store.high_qc(),
                }],
            );
        }

        if view.is_genesis() {
            warn!(vertex_id = ?qc.proposed().vertex_id, "Ignoring unknown genesis QC");
            return (SyncResult::Invalid, vec![]);
        }

        let sync_id = qc.proposed().vertex_id;
        if let Some(state) = self.sync_states.get_mut(&sync_id) {
            if let Some(author) = author {
                if state.join(author) {
                    debug!(sync = %state, author = author.0, "Author joined sync");
                }
            }
            return (SyncResult::InProgress, vec![]);
        }

        let Some(author) = author else {
            panic!(
                "Sync to QC at view {} (vertex {:?}) required but no author was provided",
                view, sync_id
            );
        };

        trace!(view = view.0, author = author.0, "Need sync");
        let actions = self.start_sync(high_qc, author);
        (SyncResult::InProgress, actions)
    }

    /// Handle a QC or TC formed from local votes.
    pub fn on_view_quorum_reached(&mut self, quorum: ViewQuorumReached) -> Vec<Action> {
        let store_high_qc = self.store.high_qc();
        let high_qc = match quorum.voting_result {
            ViewVotingResult::FormedQc(qc) => store_high_qc.with_highest_qc(qc),
            ViewVotingResult::FormedTc(tc) => store_high_qc.with_highest_tc(Some(tc)),
        };
        self.sync_to_qc(high_qc, Some(quorum.last_author)).1
    }

    /// Whether the store lacks the committed vertex and is rooted below it.
    fn requires_ledger_sync(&self, state: &SyncState) -> bool {
        let committed = state.committed_header();
        !self.store.contains_vertex(&committed.vertex_id)
            && self.store.root().view() < committed.view
    }

    fn start_sync(&mut self, high_qc: HighQc, author: ValidatorId) -> Vec<Action> {
        let state = SyncState::new(high_qc, author);
        let sync_id = state.id();
        let committed_sync = self.requires_ledger_sync(&state);
        self.sync_states.insert(state);

        if committed_sync {
            self.do_committed_sync(sync_id)
        } else {
            self.do_qc_sync(sync_id)
        }
    }

    fn do_qc_sync(&mut self, sync_id: Hash) -> Vec<Action> {
        let Some(state) = self.sync_states.get_mut(&sync_id) else {
            return vec![];
        };
        state.set_stage(SyncStage::GetQcVertices);
        debug!(sync = %state, "Sending initial QC vertices request");

        let author = state.author();
        let qc = state.high_qc().highest_qc().clone();
        let authors = self.candidates(author, qc.signers().iter().copied());

        self.send_request(
            qc.view(),
            GetVerticesRequest::new(qc.proposed().vertex_id, QC_STEP),
            authors,
            sync_id,
        )
    }

    fn do_committed_sync(&mut self, sync_id: Hash) -> Vec<Action> {
        let Some(state) = self.sync_states.get_mut(&sync_id) else {
            return vec![];
        };
        state.set_stage(SyncStage::GetCommittedVertices);
        debug!(sync = %state, "Sending initial committed vertices request");

        let author = state.author();
        let committed_qc = state.high_qc().highest_committed_qc().clone();
        let authors = self.candidates(author, committed_qc.signers().iter().copied());

        self.send_request(
            committed_qc.view(),
            GetVerticesRequest::new(committed_qc.proposed().vertex_id, COMMITTED_WINDOW),
            authors,
            sync_id,
        )
    }

    /// `first` followed by `rest`, without ourselves or duplicates.
    fn candidates(
        &self,
        first: ValidatorId,
        rest: impl IntoIterator<Item = ValidatorId>,
    ) -> Vec<ValidatorId> {
        std::iter::once(first)
            .chain(rest)
            .filter(|node| *node != self.self_id)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    fn send_request(
        &mut self,
        view: View,
        request: GetVerticesRequest,
        authors: Vec<ValidatorId>,
        sync_id: Hash,
    ) -> Vec<Action> {
        let (outcome, actions) =
            self.requests
                .send_request(self.now, view, request, authors, sync_id);
        match outcome {
            SendOutcome::Dispatched { .. } => self.counters.requests_sent += 1,
            SendOutcome::RateLimited => self.counters.requests_rate_limited += 1,
            SendOutcome::Joined => {}
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Responses
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle vertices sent by a peer.
    pub fn on_vertices_response(
        &mut self,
        from: ValidatorId,
        response: GetVerticesResponse,
    ) -> Vec<Action> {
        let Some(request) = response.request() else {
            warn!(from = from.0, "Ignoring empty vertices response");
            return vec![];
        };

        let Some(request_state) = self.requests.take(&request) else {
            self.counters.unmatched_responses += 1;
            debug!(%request, from = from.0, "Ignoring vertices response for no outstanding request");
            return vec![];
        };

        debug!(%request, from = from.0, "Received vertices response");

        let mut actions = vec![];
        for sync_id in request_state.sync_ids() {
            // Another sync may already have satisfied this one
            let Some(stage) = self.sync_states.get(sync_id).map(SyncState::stage) else {
                continue;
            };

            match stage {
                SyncStage::GetCommittedVertices => {
                    actions.extend(self.process_committed_vertices(*sync_id, from, &response));
                }
                SyncStage::GetQcVertices => {
                    actions.extend(self.process_qc_vertices(*sync_id, &response));
                }
                SyncStage::Preparing | SyncStage::LedgerSync => {
                    warn!(
                        sync_id = ?sync_id,
                        %stage,
                        %request,
                        "Sync is not waiting for vertices"
                    );
                }
            }
        }
        actions
    }

    fn process_qc_vertices(&mut self, sync_id: Hash, response: &GetVerticesResponse) -> Vec<Action> {
        let Some(vertex) = response.vertices.first().cloned() else {
            return vec![];
        };
        let Some(state) = self.sync_states.get_mut(&sync_id) else {
            return vec![];
        };

        let parent_id = vertex.parent_id();
        state.prepend_fetched(vertex.clone());

        if !self.store.contains_vertex(&parent_id) {
            debug!(
                sync = %state,
                root_view = self.store.root().view().0,
                "Sending further QC vertices request"
            );

            let author = state.author();
            let view = state.high_qc().highest_qc().view();
            let joined: Vec<_> = state.joined_authors().collect();
            let authors = self.candidates(
                author,
                joined.into_iter().chain(vertex.qc().signers().iter().copied()),
            );
            return self.send_request(
                view,
                GetVerticesRequest::new(parent_id, QC_STEP),
                authors,
                sync_id,
            );
        }

        let Some(state) = self.sync_states.remove(&sync_id) else {
            return vec![];
        };

        let chain = match VertexChain::new(state.fetched().iter().cloned().collect()) {
            Ok(chain) => chain,
            Err(error) => {
                warn!(sync = %state, %error, "Fetched vertices do not form a chain");
                return vec![];
            }
        };

        if let Err(error) = self.store.insert_vertex_chain(chain) {
            warn!(sync = %state, %error, "Failed to insert fetched vertices");
            return vec![];
        }

        debug!(sync = %state, "Inserted fetched vertices");
        self.sync_to_qc(state.high_qc().clone(), Some(state.author())).1
    }

    fn process_committed_vertices(
        &mut self,
        sync_id: Hash,
        from: ValidatorId,
        response: &GetVerticesResponse,
    ) -> Vec<Action> {
        let Some(state) = self.sync_states.get_mut(&sync_id) else {
            return vec![];
        };

        debug!(
            sync = %state,
            from = from.0,
            ledger_state_version = self.current_ledger_proof.state_version(),
            "Processing committed vertices"
        );

        state.append_fetched(response.vertices.iter().cloned());

        if state.committed_proof().state_version() <= self.current_ledger_proof.state_version() {
            return self.rebuild_and_sync_qc(sync_id);
        }

        state.set_stage(SyncStage::LedgerSync);
        let proof = state.committed_proof().clone();
        self.ledger_waitlist
            .register(proof.header().clone(), sync_id);
        self.counters.ledger_syncs_requested += 1;

        info!(
            sync_id = ?sync_id,
            target_state_version = proof.state_version(),
            ledger_state_version = self.current_ledger_proof.state_version(),
            "Waiting for ledger sync"
        );

        let target_nodes = proof.signers_without(self.self_id);
        vec![Action::RequestLedgerSync {
            request: LocalSyncRequest::new(proof, target_nodes),
        }]
    }

    /// Rebuild the store on the fetched committed vertices if still needed,
    /// then retry the sync's target.
    fn rebuild_and_sync_qc(&mut self, sync_id: Hash) -> Vec<Action> {
        let Some(state) = self.sync_states.remove(&sync_id) else {
            return vec![];
        };

        debug!(
            sync = %state,
            root_view = self.store.root().view().0,
            "Rebuilding and syncing QC"
        );

        let mut actions = vec![];
        if self.requires_ledger_sync(&state) {
            actions.extend(self.rebuild(&state));
        } else {
            debug!(sync = %state, "Skipping rebuild");
        }

        actions.extend(self.sync_to_qc(state.high_qc().clone(), Some(state.author())).1);
        actions
    }

    fn rebuild(&mut self, state: &SyncState) -> Option<Action> {
        let mut vertices = state.fetched_by_view();
        if vertices.is_empty() {
            warn!(sync = %state, "No fetched vertices to rebuild from");
            return None;
        }
        let root = vertices.remove(0);

        let high_qc = match HighQc::from_committed(state.high_qc().highest_committed_qc().clone()) {
            Ok(high_qc) => high_qc,
            Err(error) => {
                warn!(sync = %state, %error, "Cannot rebuild without a committing QC");
                return None;
            }
        };

        let store_state = VertexStoreState::new(
            high_qc,
            root,
            vertices,
            self.store.highest_timeout_certificate().cloned(),
        );
        if !self.store.try_rebuild(store_state) {
            return None;
        }

        self.counters.rebuilds += 1;
        Some(Action::ProcessHighQc {
            high_qc: self.store.high_qc(),
        })
    }

    /// Handle a peer refusing one of our vertices requests.
    pub fn on_vertices_error_response(
        &mut self,
        from: ValidatorId,
        response: GetVerticesErrorResponse,
    ) -> Vec<Action> {
        if !self.requests.contains(&response.request) {
            self.counters.unmatched_responses += 1;
            trace!(request = %response.request, from = from.0, "Ignoring unmatched error response");
            return vec![];
        }

        let local_view = self.store.high_qc().highest_qc().view();
        let remote_view = response.high_qc.highest_qc().view();
        debug!(
            request = %response.request,
            from = from.0,
            local_view = local_view.0,
            remote_view = remote_view.0,
            "Received vertices error response"
        );

        // The peer has moved on, so chase its high QC instead
        if remote_view > local_view {
            return self.sync_to_qc(response.high_qc, Some(from)).1;
        }
        vec![]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Timeouts
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a vertices request running out of patience.
    ///
    /// Abandons the outstanding request with the highest view and retries each
    /// sync waiting on it against a random candidate author.
    ///
    /// # Panics
    ///
    /// Panics if the abandoned request has no candidate authors.
    pub fn on_vertex_request_timeout(&mut self, timed_out: GetVerticesRequest) -> Vec<Action> {
        let Some(request) = self.requests.highest_view_request() else {
            trace!(request = %timed_out, "Request timeout with nothing outstanding");
            return vec![];
        };
        let Some(request_state) = self.requests.take(&request) else {
            return vec![];
        };

        if request_state.authors().is_empty() {
            panic!(
                "Vertices request {} timed out with no candidate authors besides ourselves",
                request
            );
        }

        let sync_ids: Vec<Hash> = request_state
            .sync_ids()
            .iter()
            .filter(|id| self.sync_states.contains(id))
            .copied()
            .collect();

        debug!(
            timer = %timed_out,
            %request,
            view = request_state.view().0,
            waiting = sync_ids.len(),
            "Vertices request timed out"
        );

        let mut actions = vec![];
        for sync_id in &sync_ids {
            self.counters.request_timeouts += 1;
            let Some(state) = self.sync_states.remove(sync_id) else {
                panic!(
                    "Sync {:?} waiting on timed out request {} is no longer tracked \
                     (waiting: {:?}, tracked: {:?})",
                    sync_id,
                    request,
                    sync_ids,
                    self.sync_states.ids().collect::<Vec<_>>()
                );
            };

            let author = request_state.authors().choose(&mut self.rng).copied();
            debug!(sync = %state, author = ?author, "Retrying sync after timeout");
            actions.extend(self.sync_to_qc(state.high_qc().clone(), author).1);
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Ledger
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle the ledger committing up to a new tail.
    ///
    /// Rebuilds every sync waiting on a header the ledger has now reached and
    /// drops syncs whose target the ledger has passed.
    pub fn on_ledger_update(&mut self, update: LedgerUpdate) -> Vec<Action> {
        let tail = update.tail;
        trace!(
            state_version = tail.state_version(),
            view = tail.view().0,
            "Ledger updated"
        );
        self.current_ledger_proof = tail.clone();

        let mut actions = vec![];
        for (header, sync_ids) in self.ledger_waitlist.drain_up_to(tail.header()) {
            debug!(
                state_version = header.state_version(),
                waiting = sync_ids.len(),
                "Ledger reached awaited state"
            );
            for sync_id in sync_ids {
                if self.sync_states.contains(&sync_id) {
                    actions.extend(self.rebuild_and_sync_qc(sync_id));
                }
            }
        }

        let tail_view = tail.view();
        let dropped = self
            .sync_states
            .retain(|state| state.high_qc().highest_qc().view() > tail_view);
        if dropped > 0 {
            debug!(dropped, tail_view = tail_view.0, "Dropped syncs passed by the ledger");
        }

        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Serving peers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Answer a peer's vertices request from the local store.
    pub fn on_get_vertices_request(
        &self,
        from: ValidatorId,
        request: GetVerticesRequest,
    ) -> Vec<Action> {
        let message = match serve_vertices_request(&self.store, &request) {
            Ok(response) => OutboundMessage::GetVerticesResponse(response),
            Err(error) => OutboundMessage::GetVerticesErrorResponse(Box::new(error)),
        };
        vec![Action::SendToValidator { to: from, message }]
    }
}

impl<S: VertexStore> StateMachine for BftSync<S> {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ViewQuorumReached { quorum } => self.on_view_quorum_reached(quorum),
            Event::SyncToQc {
                high_qc,
                author,
                request_id,
            } => {
                let (result, mut actions) = self.sync_to_qc(high_qc, author);
                actions.push(Action::EmitSyncResult { request_id, result });
                actions
            }
            Event::GetVerticesResponseReceived { from, response } => {
                self.on_vertices_response(from, response)
            }
            Event::GetVerticesErrorResponseReceived { from, response } => {
                self.on_vertices_error_response(from, response)
            }
            Event::GetVerticesRequestReceived { from, request } => {
                self.on_get_vertices_request(from, request)
            }
            Event::VertexRequestTimeout { request } => self.on_vertex_request_timeout(request),
            Event::LedgerUpdated { update } => self.on_ledger_update(update),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
