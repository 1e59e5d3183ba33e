//! In-memory vertex store.

use crate::store::{VertexStore, VertexStoreError};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use vsync_types::{
    Hash, HighQc, QuorumCertificate, TimeoutCertificate, VertexChain, VertexStoreState,
    VerifiedVertex,
};

/// Vertex store keeping the uncommitted tree above the root in memory.
///
/// Committing a vertex makes it the new root and prunes every vertex that
/// does not descend from it.
#[derive(Debug, Clone)]
pub struct InMemoryVertexStore {
    /// Last committed vertex.
    root: VerifiedVertex,

    /// Uncommitted vertices by id. Never contains the root.
    vertices: HashMap<Hash, VerifiedVertex>,

    /// Child ids by parent id, in insertion order. The root always has an entry.
    children: HashMap<Hash, IndexSet<Hash>>,

    /// Highest QC, highest committed QC and highest TC.
    high_qc: HighQc,
}

impl InMemoryVertexStore {
    /// Create a store from a saved state.
    pub fn new(state: VertexStoreState) -> Result<Self, VertexStoreError> {
        let VertexStoreState {
            high_qc,
            root,
            vertices,
            highest_tc,
        } = state;

        let mut store = Self::empty(root, high_qc.with_highest_tc(highest_tc));
        for vertex in vertices {
            store.insert_vertex(vertex)?;
        }
        Ok(store)
    }

    fn empty(root: VerifiedVertex, high_qc: HighQc) -> Self {
        let mut children = HashMap::new();
        children.insert(root.id(), IndexSet::new());
        Self {
            root,
            vertices: HashMap::new(),
            children,
            high_qc,
        }
    }

    /// Insert a single vertex whose parent is already stored.
    ///
    /// Inserting a vertex that is already stored is a no-op.
    pub fn insert_vertex(&mut self, vertex: VerifiedVertex) -> Result<(), VertexStoreError> {
        let vertex_id = vertex.id();
        if self.vertices.contains_key(&vertex_id) {
            return Ok(());
        }

        let parent_id = vertex.parent_id();
        if !self.contains_vertex(&parent_id) {
            return Err(VertexStoreError::MissingParent {
                vertex_id,
                parent_id,
            });
        }

        debug!(
            view = vertex.view().0,
            vertex_id = ?vertex_id,
            "Inserted vertex"
        );

        self.children.entry(parent_id).or_default().insert(vertex_id);
        self.children.insert(vertex_id, IndexSet::new());
        self.vertices.insert(vertex_id, vertex);
        Ok(())
    }

    /// Number of uncommitted vertices above the root.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if nothing is stored above the root.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get a stored vertex (root included).
    pub fn vertex(&self, vertex_id: &Hash) -> Option<&VerifiedVertex> {
        if *vertex_id == self.root.id() {
            return Some(&self.root);
        }
        self.vertices.get(vertex_id)
    }

    /// Make `vertex_id` the new root and drop everything not descending from it.
    fn commit(&mut self, vertex_id: Hash, commit_qc: &QuorumCertificate) {
        let Some(tip) = self.vertices.get(&vertex_id).cloned() else {
            panic!(
                "Committing vertex {:?} not in store (root {:?} at view {})",
                vertex_id,
                self.root.id(),
                self.root.view()
            );
        };

        match self.high_qc.with_committed_qc(commit_qc.clone()) {
            Ok(high_qc) => self.high_qc = high_qc,
            Err(error) => {
                warn!(?error, "Ignoring commit from QC without commit");
                return;
            }
        }

        let mut keep = HashSet::new();
        let mut frontier = vec![vertex_id];
        while let Some(id) = frontier.pop() {
            if let Some(children) = self.children.get(&id) {
                for child in children {
                    if keep.insert(*child) {
                        frontier.push(*child);
                    }
                }
            }
        }

        let before = self.vertices.len();
        self.vertices.retain(|id, _| keep.contains(id));
        self.children
            .retain(|id, _| *id == vertex_id || keep.contains(id));

        info!(
            old_root_view = self.root.view().0,
            new_root_view = tip.view().0,
            pruned = before - self.vertices.len(),
            "Committed vertex"
        );

        self.root = tip;
    }
}

impl VertexStore for InMemoryVertexStore {
    fn contains_vertex(&self, vertex_id: &Hash) -> bool {
        *vertex_id == self.root.id() || self.vertices.contains_key(vertex_id)
    }

    fn add_qc(&mut self, qc: &QuorumCertificate) -> bool {
        let proposed = qc.proposed().vertex_id;
        if !self.contains_vertex(&proposed) {
            return false;
        }

        // Already built upon, so the QC is old news
        if self
            .children
            .get(&proposed)
            .is_some_and(|children| !children.is_empty())
        {
            return true;
        }

        if qc.view() > self.high_qc.highest_qc().view() {
            debug!(
                old_view = self.high_qc.highest_qc().view().0,
                new_view = qc.view().0,
                "Updated highest QC"
            );
            self.high_qc = self.high_qc.with_highest_qc(qc.clone());
        }

        if let Some(committed) = qc.committed() {
            if committed.view > self.root.view() {
                self.commit(committed.vertex_id, qc);
            }
        }

        true
    }

    fn insert_vertex_chain(&mut self, chain: VertexChain) -> Result<(), VertexStoreError> {
        for vertex in chain.into_vertices() {
            if !self.add_qc(vertex.qc()) {
                return Ok(());
            }
            self.insert_vertex(vertex)?;
        }
        Ok(())
    }

    fn try_rebuild(&mut self, state: VertexStoreState) -> bool {
        let mut known = HashSet::from([state.root.id()]);
        for vertex in &state.vertices {
            if !known.contains(&vertex.parent_id()) {
                warn!(
                    root_view = state.root.view().0,
                    view = vertex.view().0,
                    vertex_id = ?vertex.id(),
                    "Rejected rebuild: vertex does not extend the new root"
                );
                return false;
            }
            known.insert(vertex.id());
        }

        let VertexStoreState {
            high_qc,
            root,
            vertices,
            highest_tc,
        } = state;

        info!(
            old_root_view = self.root.view().0,
            new_root_view = root.view().0,
            vertices = vertices.len(),
            "Rebuilt vertex store"
        );

        *self = Self::empty(root, high_qc.with_highest_tc(highest_tc));
        for vertex in vertices {
            let vertex_id = vertex.id();
            self.children
                .entry(vertex.parent_id())
                .or_default()
                .insert(vertex_id);
            self.children.insert(vertex_id, IndexSet::new());
            self.vertices.insert(vertex_id, vertex);
        }
        true
    }

    fn root(&self) -> &VerifiedVertex {
        &self.root
    }

    fn high_qc(&self) -> HighQc {
        self.high_qc.clone()
    }

    fn highest_timeout_certificate(&self) -> Option<&TimeoutCertificate> {
        self.high_qc.highest_tc()
    }

    fn insert_timeout_certificate(&mut self, tc: TimeoutCertificate) {
        let is_higher = self
            .high_qc
            .highest_tc()
            .is_none_or(|current| current.view < tc.view);
        if is_higher {
            self.high_qc = self.high_qc.with_highest_tc(Some(tc));
        }
    }

    fn get_vertices(&self, vertex_id: &Hash, count: usize) -> Option<Vec<VerifiedVertex>> {
        let mut result = Vec::with_capacity(count);
        let mut next = *vertex_id;
        for _ in 0..count {
            let vertex = self.vertex(&next)?;
            next = vertex.parent_id();
            result.push(vertex.clone());
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use vsync_test_helpers::TestChain;
    use vsync_types::{Epoch, View};

    #[traced_test]
    #[test]
    fn test_new_from_state() {
        let chain = TestChain::new(6);
        let store = InMemoryVertexStore::new(chain.store_state(2, 4)).unwrap();

        assert_eq!(store.root().view(), View(2));
        assert_eq!(store.len(), 2);
        assert!(store.contains_vertex(&chain.vertex(2).id()));
        assert!(store.contains_vertex(&chain.vertex(4).id()));
        assert!(!store.contains_vertex(&chain.vertex(5).id()));
    }

    #[traced_test]
    #[test]
    fn test_new_rejects_orphan() {
        let chain = TestChain::new(6);
        let mut state = chain.store_state(2, 2);
        state.vertices.push(chain.vertex(4).clone());

        assert_eq!(
            InMemoryVertexStore::new(state).unwrap_err(),
            VertexStoreError::MissingParent {
                vertex_id: chain.vertex(4).id(),
                parent_id: chain.vertex(3).id(),
            }
        );
    }

    #[traced_test]
    #[test]
    fn test_add_qc_for_unknown_vertex() {
        let chain = TestChain::new(8);
        let mut store = InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();

        assert!(!store.add_qc(chain.qc(8)));
        assert_eq!(store.root().view(), View(5));
    }

    #[traced_test]
    #[test]
    fn test_add_qc_updates_high_qc_and_commits() {
        let chain = TestChain::new(8);
        let mut store = InMemoryVertexStore::new(chain.store_state(2, 6)).unwrap();

        // QC on V6 commits V4
        assert!(store.add_qc(chain.qc(6)));
        assert_eq!(store.high_qc().highest_qc().view(), View(6));
        assert_eq!(store.high_qc().highest_committed_qc().view(), View(6));
        assert_eq!(store.root().view(), View(4));
        assert!(!store.contains_vertex(&chain.vertex(3).id()));
        assert!(store.contains_vertex(&chain.vertex(5).id()));
        assert_eq!(store.len(), 2);
    }

    #[traced_test]
    #[test]
    fn test_add_qc_for_vertex_with_children_is_noop() {
        let chain = TestChain::new(8);
        let mut store = InMemoryVertexStore::new(chain.store_state(2, 6)).unwrap();
        let before = store.high_qc();

        // V6 extends V5, so the QC on V5 is already known
        assert!(store.add_qc(chain.qc(5)));
        assert_eq!(store.high_qc(), before);
        assert_eq!(store.root().view(), View(2));
    }

    #[traced_test]
    #[test]
    fn test_insert_vertex_chain() {
        let chain = TestChain::new(8);
        let mut store = InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();

        let vertices = VertexChain::new(chain.vertices(6, 8)).unwrap();
        store.insert_vertex_chain(vertices).unwrap();

        assert!(store.contains_vertex(&chain.vertex(8).id()));
        assert!(store.add_qc(chain.qc(8)));
        assert_eq!(store.high_qc().highest_qc().view(), View(8));
    }

    #[traced_test]
    #[test]
    fn test_insert_vertex_chain_stops_at_unknown_qc() {
        let chain = TestChain::new(8);
        let mut store = InMemoryVertexStore::new(chain.store_state(5, 5)).unwrap();

        // V7's QC certifies V6, which the store does not have
        let vertices = VertexChain::new(chain.vertices(7, 8)).unwrap();
        store.insert_vertex_chain(vertices).unwrap();

        assert!(!store.contains_vertex(&chain.vertex(7).id()));
        assert!(store.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_try_rebuild() {
        let chain = TestChain::new(12);
        let mut store = InMemoryVertexStore::new(chain.store_state(2, 2)).unwrap();

        let state = chain.store_state(10, 12);
        assert!(store.try_rebuild(state));
        assert_eq!(store.root().view(), View(10));
        assert!(store.contains_vertex(&chain.vertex(12).id()));
        assert!(!store.contains_vertex(&chain.vertex(2).id()));
    }

    #[traced_test]
    #[test]
    fn test_try_rebuild_rejects_broken_chain() {
        let chain = TestChain::new(12);
        let mut store = InMemoryVertexStore::new(chain.store_state(2, 2)).unwrap();

        let mut state = chain.store_state(10, 10);
        state.vertices.push(chain.vertex(12).clone());
        assert!(!store.try_rebuild(state));
        assert_eq!(store.root().view(), View(2));
    }

    #[traced_test]
    #[test]
    fn test_timeout_certificates_keep_highest() {
        let chain = TestChain::new(4);
        let mut store = InMemoryVertexStore::new(chain.store_state(2, 2)).unwrap();

        store.insert_timeout_certificate(chain.timeout_certificate(View(6)));
        store.insert_timeout_certificate(chain.timeout_certificate(View(5)));

        assert_eq!(store.highest_timeout_certificate().map(|tc| tc.view), Some(View(6)));
        assert_eq!(
            store.high_qc().highest_tc().map(|tc| tc.epoch),
            Some(Epoch(1))
        );
    }

    #[traced_test]
    #[test]
    fn test_get_vertices_walks_parents() {
        let chain = TestChain::new(8);
        let store = InMemoryVertexStore::new(chain.store_state(3, 7)).unwrap();

        let fetched = store.get_vertices(&chain.vertex(6).id(), 4).unwrap();
        let views: Vec<_> = fetched.iter().map(|v| v.view().0).collect();
        assert_eq!(views, vec![6, 5, 4, 3]);

        // Walking past the root fails
        assert!(store.get_vertices(&chain.vertex(6).id(), 5).is_none());
        assert!(store.get_vertices(&chain.vertex(8).id(), 1).is_none());
    }
}
