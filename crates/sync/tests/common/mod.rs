//! Shared harness: a sync state machine talking to peers that answer from a
//! fully populated store.

#![allow(dead_code)]

use vsync_bft::{serve_vertices_request, InMemoryVertexStore};
use vsync_bft_sync::{BftSync, SyncConfig};
use vsync_core::{Action, OutboundMessage};
use vsync_messages::{GetVerticesRequest, GetVerticesResponse, LocalSyncRequest};
use vsync_test_helpers::TestChain;
use vsync_types::{HighQc, ValidatorId};

pub const SELF: ValidatorId = ValidatorId(0);

/// Sync state machine over a store rooted at `root`, with the ledger at `ledger`.
pub fn make_sync(chain: &TestChain, root: u64, ledger: u64) -> BftSync<InMemoryVertexStore> {
    let store = InMemoryVertexStore::new(chain.store_state(root, root)).unwrap();
    BftSync::new(SELF, store, chain.ledger_proof(ledger), SyncConfig::default())
}

/// Store holding the whole chain, as an honest peer that is up to date.
pub fn full_peer(chain: &TestChain) -> InMemoryVertexStore {
    InMemoryVertexStore::new(chain.store_state(0, chain.tip())).unwrap()
}

/// Vertices requests sent, with their targets.
pub fn sent_requests(actions: &[Action]) -> Vec<(ValidatorId, GetVerticesRequest)> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::SendToValidator {
                to,
                message: OutboundMessage::GetVerticesRequest(request),
            } => Some((*to, *request)),
            _ => None,
        })
        .collect()
}

/// High QCs handed to the pacemaker.
pub fn processed_high_qcs(actions: &[Action]) -> Vec<HighQc> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::ProcessHighQc { high_qc } => Some(high_qc.clone()),
            _ => None,
        })
        .collect()
}

/// Ledger syncs requested.
pub fn ledger_sync_requests(actions: &[Action]) -> Vec<LocalSyncRequest> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::RequestLedgerSync { request } => Some(request.clone()),
            _ => None,
        })
        .collect()
}

/// Answer a request the way `peer` would.
pub fn answer(peer: &InMemoryVertexStore, request: &GetVerticesRequest) -> GetVerticesResponse {
    serve_vertices_request(peer, request).expect("peer holds the requested vertices")
}

/// Keep answering every vertices request from `peer` until none are sent.
///
/// Returns the number of request/response round trips and every action that
/// was not a vertices request.
pub fn exchange(
    sync: &mut BftSync<InMemoryVertexStore>,
    peer: &InMemoryVertexStore,
    mut actions: Vec<Action>,
) -> (usize, Vec<Action>) {
    let mut round_trips = 0;
    let mut rest = vec![];
    loop {
        let requests = sent_requests(&actions);
        rest.extend(actions.into_iter().filter(|action| {
            !matches!(
                action,
                Action::SendToValidator {
                    message: OutboundMessage::GetVerticesRequest(_),
                    ..
                }
            )
        }));
        if requests.is_empty() {
            return (round_trips, rest);
        }

        actions = vec![];
        for (to, request) in requests {
            round_trips += 1;
            actions.extend(sync.on_vertices_response(to, answer(peer, &request)));
        }
    }
}
