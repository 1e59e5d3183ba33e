//! Request sharing, retries, error chasing and ledger draining.

mod common;

use common::*;
use std::time::Duration;
use tracing_test::traced_test;
use vsync_bft::VertexStore;
use vsync_bft_sync::{BftSync, RateLimitConfig, SyncConfig, SyncStage};
use vsync_core::{Action, Event, StateMachine, SyncResult};
use vsync_messages::{GetVerticesErrorResponse, GetVerticesRequest, LedgerUpdate};
use vsync_test_helpers::TestChain;
use vsync_types::{ValidatorId, View, ViewQuorumReached, ViewVotingResult};

#[traced_test]
#[test]
fn test_shared_ancestor_is_requested_once() {
    let chain = TestChain::new(8);
    let peer = full_peer(&chain);
    let mut sync = make_sync(&chain, 5, 5);

    let (_, first) = sync.sync_to_qc(chain.high_qc_committing(7, 7), Some(ValidatorId(1)));
    let (_, second) = sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(2)));
    assert_eq!(sent_requests(&first).len(), 1);
    assert_eq!(sent_requests(&second).len(), 1);

    // Walking back from vertex 8 reaches the request already out for vertex 7
    let v8 = GetVerticesRequest::new(chain.vertex(8).id(), 1);
    let actions = sync.on_vertices_response(ValidatorId(2), answer(&peer, &v8));
    assert!(sent_requests(&actions).is_empty());

    let v7 = GetVerticesRequest::new(chain.vertex(7).id(), 1);
    assert_eq!(
        sync.request_state(&v7).unwrap().sync_ids(),
        &[chain.vertex(7).id(), chain.vertex(8).id()]
    );

    // Both syncs then need vertex 6, and only one request goes out
    let actions = sync.on_vertices_response(ValidatorId(1), answer(&peer, &v7));
    let v6 = GetVerticesRequest::new(chain.vertex(6).id(), 1);
    assert_eq!(sent_requests(&actions), vec![(ValidatorId(1), v6)]);
    assert_eq!(sync.request_state(&v6).unwrap().sync_ids().len(), 2);

    let actions = sync.on_vertices_response(ValidatorId(1), answer(&peer, &v6));
    assert_eq!(processed_high_qcs(&actions).len(), 2);
    assert_eq!(sync.sync_count(), 0);
    assert_eq!(sync.outstanding_requests(), 0);
    assert_eq!(sync.counters().requests_sent, 3);
    assert_eq!(sync.store().high_qc().highest_qc().view(), View(8));
}

#[traced_test]
#[test]
fn test_duplicate_response_is_unmatched() {
    let chain = TestChain::new(8);
    let peer = full_peer(&chain);
    let mut sync = make_sync(&chain, 5, 5);

    sync.sync_to_qc(chain.high_qc_committing(6, 6), Some(ValidatorId(1)));
    let request = GetVerticesRequest::new(chain.vertex(6).id(), 1);

    let actions = sync.on_vertices_response(ValidatorId(1), answer(&peer, &request));
    assert_eq!(processed_high_qcs(&actions).len(), 1);

    let actions = sync.on_vertices_response(ValidatorId(1), answer(&peer, &request));
    assert!(actions.is_empty());
    assert_eq!(sync.counters().unmatched_responses, 1);
}

#[traced_test]
#[test]
fn test_rejected_qcs_leave_no_trace() {
    let chain = TestChain::new(12);
    let mut sync = make_sync(&chain, 6, 6);

    for view in [3, 5] {
        let (result, actions) = sync.sync_to_qc(chain.high_qc(view), Some(ValidatorId(1)));
        assert_eq!(result, SyncResult::Invalid);
        assert!(actions.is_empty());
    }

    let (result, actions) = sync.sync_to_qc(chain.high_qc(6), Some(ValidatorId(1)));
    assert_eq!(result, SyncResult::Synced);
    assert!(sent_requests(&actions).is_empty());

    assert_eq!(sync.sync_count(), 0);
    assert_eq!(sync.outstanding_requests(), 0);
}

#[traced_test]
#[test]
fn test_timeout_retries_with_candidate_author() {
    let chain = TestChain::new(8);
    let mut sync = make_sync(&chain, 5, 5);

    sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(1)));
    let request = GetVerticesRequest::new(chain.vertex(8).id(), 1);

    sync.set_time(Duration::from_millis(200));
    let actions = sync.handle(Event::VertexRequestTimeout { request });

    let sent = sent_requests(&actions);
    assert_eq!(sent.len(), 1);
    let (to, retried) = sent[0];
    assert_eq!(retried, request);
    assert!([ValidatorId(1), ValidatorId(2), ValidatorId(3)].contains(&to));

    assert_eq!(sync.counters().request_timeouts, 1);
    assert_eq!(sync.sync_count(), 1);
    assert_eq!(sync.sync_state(&chain.vertex(8).id()).unwrap().author(), to);

    // The stale timer for the answered request is a no-op
    let peer = full_peer(&chain);
    exchange(&mut sync, &peer, actions);
    let actions = sync.on_vertex_request_timeout(request);
    assert!(actions.is_empty());
    assert_eq!(sync.counters().request_timeouts, 1);
}

#[traced_test]
#[test]
fn test_timeout_abandons_highest_view_request() {
    let chain = TestChain::new(8);
    let mut sync = make_sync(&chain, 5, 5);

    sync.sync_to_qc(chain.high_qc_committing(6, 6), Some(ValidatorId(1)));
    sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(2)));

    // The timer for the lower request fires first
    let low = GetVerticesRequest::new(chain.vertex(6).id(), 1);
    let high = GetVerticesRequest::new(chain.vertex(8).id(), 1);
    sync.on_vertex_request_timeout(low);

    // Only the higher sync was retried, reissuing its request
    assert_eq!(sync.counters().request_timeouts, 1);
    assert_eq!(sync.counters().requests_sent, 3);
    assert!(sync.request_state(&low).is_some());
    assert!(sync.request_state(&high).is_some());
    assert_eq!(sync.sync_count(), 2);
}

#[traced_test]
#[test]
fn test_retry_author_is_deterministic_per_seed() {
    let chain = TestChain::new(8);
    let retry_target = |seed: u64| {
        let store = vsync_bft::InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();
        let config = SyncConfig::default().with_rng_seed(seed);
        let mut sync = BftSync::new(SELF, store, chain.ledger_proof(5), config);
        sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(1)));
        let actions =
            sync.on_vertex_request_timeout(GetVerticesRequest::new(chain.vertex(8).id(), 1));
        sent_requests(&actions)[0].0
    };

    assert_eq!(retry_target(42), retry_target(42));
}

#[traced_test]
#[test]
fn test_rate_limited_request_is_retried_on_timeout() {
    let chain = TestChain::new(8);
    let store = vsync_bft::InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();
    let config = SyncConfig::default().with_rate_limit(1, 1);
    let mut sync = BftSync::new(SELF, store, chain.ledger_proof(5), config);

    sync.sync_to_qc(chain.high_qc_committing(6, 6), Some(ValidatorId(1)));
    let (_, actions) = sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(2)));

    // Shed by the limiter, but the timer is still armed
    assert!(sent_requests(&actions).is_empty());
    assert!(actions.iter().any(|a| matches!(a, Action::SetTimer { .. })));
    assert_eq!(sync.counters().requests_rate_limited, 1);

    sync.set_time(Duration::from_secs(1));
    let request = GetVerticesRequest::new(chain.vertex(8).id(), 1);
    let actions = sync.on_vertex_request_timeout(request);
    assert_eq!(sent_requests(&actions).len(), 1);
    assert_eq!(sync.counters().requests_sent, 2);
}

#[traced_test]
#[test]
fn test_error_response_chases_higher_qc() {
    let chain = TestChain::new(12);
    let mut sync = make_sync(&chain, 5, 5);

    sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(1)));
    let request = GetVerticesRequest::new(chain.vertex(8).id(), 1);

    let actions = sync.handle(Event::GetVerticesErrorResponseReceived {
        from: ValidatorId(3),
        response: GetVerticesErrorResponse::new(request, chain.high_qc(12)),
    });

    assert_eq!(
        sent_requests(&actions),
        vec![(ValidatorId(3), GetVerticesRequest::new(chain.vertex(12).id(), 3))]
    );
    assert_eq!(sync.sync_count(), 2);
}

#[traced_test]
#[test]
fn test_ledger_update_drains_reached_headers_only() {
    let chain = TestChain::new(12);
    let peer = full_peer(&chain);
    let mut sync = make_sync(&chain, 2, 2);

    // Targets committing vertices 6, 8 and 10
    let mut actions = vec![];
    for (view, author) in [(8, 1), (10, 2), (12, 3)] {
        let (_, more) = sync.sync_to_qc(chain.high_qc(view), Some(ValidatorId(author)));
        actions.extend(more);
    }
    let (_, actions) = exchange(&mut sync, &peer, actions);
    assert_eq!(ledger_sync_requests(&actions).len(), 3);
    assert_eq!(sync.ledger_waitlist().len(), 3);

    let actions = sync.on_ledger_update(LedgerUpdate::new(chain.committed_proof(10)));

    // Vertex 6 is rebuilt on first, which already holds vertex 8, so the
    // second sync falls back to fetching QC vertices
    assert_eq!(sync.counters().rebuilds, 1);
    assert_eq!(sync.store().root().view(), View(6));
    assert!(sync.sync_state(&chain.vertex(8).id()).is_none());
    assert_eq!(
        sync.sync_state(&chain.vertex(10).id()).unwrap().stage(),
        SyncStage::GetQcVertices
    );
    assert_eq!(
        sent_requests(&actions),
        vec![(ValidatorId(2), GetVerticesRequest::new(chain.vertex(10).id(), 1))]
    );

    assert_eq!(sync.ledger_waitlist().len(), 1);
    assert!(sync.ledger_waitlist().contains(&chain.vertex(12).id()));
    assert_eq!(
        sync.sync_state(&chain.vertex(12).id()).unwrap().stage(),
        SyncStage::LedgerSync
    );
    assert_eq!(sync.current_ledger_proof(), &chain.committed_proof(10));
}

#[traced_test]
#[test]
fn test_ledger_update_drops_passed_syncs() {
    let chain = TestChain::new(12);
    let mut sync = make_sync(&chain, 2, 2);

    sync.sync_to_qc(chain.high_qc(8), Some(ValidatorId(1)));
    sync.sync_to_qc(chain.high_qc(12), Some(ValidatorId(1)));
    assert_eq!(sync.sync_count(), 2);

    sync.on_ledger_update(LedgerUpdate::new(chain.ledger_proof(9)));

    assert!(sync.sync_state(&chain.vertex(8).id()).is_none());
    assert!(sync.sync_state(&chain.vertex(12).id()).is_some());
}

#[traced_test]
#[test]
fn test_view_quorum_reached_with_formed_qc() {
    let chain = TestChain::new(8);
    let peer = full_peer(&chain);
    let mut sync = make_sync(&chain, 5, 5);

    let quorum = ViewQuorumReached::new(
        ViewVotingResult::FormedQc(chain.qc(8).clone()),
        ValidatorId(2),
    );
    let actions = sync.handle(Event::ViewQuorumReached { quorum });
    let (round_trips, actions) = exchange(&mut sync, &peer, actions);

    assert_eq!(round_trips, 3);
    assert_eq!(processed_high_qcs(&actions).len(), 1);
    assert_eq!(sync.store().high_qc().highest_qc().view(), View(8));
}

#[traced_test]
#[test]
fn test_rate_limit_burst_sheds_third_request() {
    let chain = TestChain::new(8);
    let store = vsync_bft::InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();
    let config = SyncConfig::default().with_rate_limit(5, 2);
    assert_eq!(
        config.rate_limit,
        RateLimitConfig {
            requests_per_sec: 5,
            burst: 2
        }
    );
    let mut sync = BftSync::new(SELF, store, chain.ledger_proof(5), config);

    let (_, first) = sync.sync_to_qc(chain.high_qc_committing(6, 6), Some(ValidatorId(1)));
    let (_, second) = sync.sync_to_qc(chain.high_qc_committing(7, 7), Some(ValidatorId(2)));
    let (_, third) = sync.sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(3)));

    assert_eq!(sent_requests(&first).len(), 1);
    assert_eq!(sent_requests(&second).len(), 1);
    assert!(sent_requests(&third).is_empty());
    assert_eq!(sync.outstanding_requests(), 3);
    assert_eq!(sync.counters().requests_sent, 2);
    assert_eq!(sync.counters().requests_rate_limited, 1);
}
