//! Outstanding vertices requests.
//!
//! Sync attempts that need the same ancestor range share one request. Only
//! the first attempt to need a range sends it; later ones wait on the same
//! entry.

use crate::SyncRequestRateLimiter;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vsync_core::{Action, OutboundMessage, TimerId};
use vsync_messages::GetVerticesRequest;
use vsync_types::{Hash, ValidatorId, View};

/// A vertices request in flight.
#[derive(Debug, Clone)]
pub struct SyncRequestState {
    /// Syncs waiting on the response, in the order they joined.
    sync_ids: Vec<Hash>,
    /// Peers that can serve the request. The first one was asked.
    authors: Vec<ValidatorId>,
    /// View of the QC the request serves. Higher views are retried first.
    view: View,
}

impl SyncRequestState {
    fn new(authors: Vec<ValidatorId>, view: View) -> Self {
        Self {
            sync_ids: Vec::new(),
            authors,
            view,
        }
    }

    fn add_waiter(&mut self, sync_id: Hash) {
        if !self.sync_ids.contains(&sync_id) {
            self.sync_ids.push(sync_id);
        }
    }

    /// Syncs waiting on this request.
    pub fn sync_ids(&self) -> &[Hash] {
        &self.sync_ids
    }

    /// Candidate peers for this request.
    pub fn authors(&self) -> &[ValidatorId] {
        &self.authors
    }

    /// View the request serves.
    pub fn view(&self) -> View {
        self.view
    }
}

/// What happened to a request handed to [`RequestTracker::send_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new request was sent to the given peer.
    Dispatched {
        /// The peer asked.
        to: ValidatorId,
    },

    /// A new request was registered but the rate limiter dropped the send.
    RateLimited,

    /// The sync joined a request already in flight.
    Joined,
}

/// Outstanding vertices requests keyed by (vertex id, count).
#[derive(Debug)]
pub struct RequestTracker {
    requests: HashMap<GetVerticesRequest, SyncRequestState>,
    limiter: Arc<SyncRequestRateLimiter>,
    patience: Duration,
}

impl RequestTracker {
    /// Create a tracker that times requests out after `patience`.
    pub fn new(limiter: Arc<SyncRequestRateLimiter>, patience: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            limiter,
            patience,
        }
    }

    /// Make `sync_id` wait on `request`, sending it if nobody else has.
    ///
    /// A new request arms its patience timer and, if the rate limiter has a
    /// token, is sent to the first of `authors`. The rest are kept for
    /// retries.
    ///
    /// # Panics
    ///
    /// Panics if a new request has no candidate authors.
    pub fn send_request(
        &mut self,
        now: Duration,
        view: View,
        request: GetVerticesRequest,
        authors: Vec<ValidatorId>,
        sync_id: Hash,
    ) -> (SendOutcome, Vec<Action>) {
        let entry = match self.requests.entry(request) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().add_waiter(sync_id);
                debug!(%request, sync_id = ?sync_id, "Joined outstanding vertices request");
                return (SendOutcome::Joined, vec![]);
            }
            Entry::Vacant(entry) => entry,
        };

        let Some(&to) = authors.first() else {
            panic!(
                "Vertices request {} for sync {:?} at view {} has no candidate authors",
                request, sync_id, view
            );
        };

        // Armed even when shed, so the timeout path retries it
        let mut actions = vec![Action::SetTimer {
            id: TimerId::VertexRequest { request },
            duration: self.patience,
        }];

        let outcome = if self.limiter.try_acquire(now) {
            debug!(%request, to = to.0, view = view.0, "Sending vertices request");
            actions.push(Action::SendToValidator {
                to,
                message: OutboundMessage::GetVerticesRequest(request),
            });
            SendOutcome::Dispatched { to }
        } else {
            warn!(%request, view = view.0, "Vertices request dropped by rate limiter");
            SendOutcome::RateLimited
        };

        let mut state = SyncRequestState::new(authors, view);
        state.add_waiter(sync_id);
        entry.insert(state);

        (outcome, actions)
    }

    /// Stop tracking a request, returning its state.
    pub fn take(&mut self, request: &GetVerticesRequest) -> Option<SyncRequestState> {
        self.requests.remove(request)
    }

    /// Get an outstanding request.
    pub fn get(&self, request: &GetVerticesRequest) -> Option<&SyncRequestState> {
        self.requests.get(request)
    }

    /// Check whether a request is outstanding.
    pub fn contains(&self, request: &GetVerticesRequest) -> bool {
        self.requests.contains_key(request)
    }

    /// The outstanding request serving the highest view.
    pub fn highest_view_request(&self) -> Option<GetVerticesRequest> {
        self.requests
            .iter()
            .max_by(|(a_request, a), (b_request, b)| {
                a.view.cmp(&b.view).then_with(|| {
                    (a_request.vertex_id, a_request.count).cmp(&(b_request.vertex_id, b_request.count))
                })
            })
            .map(|(request, _)| *request)
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
