//! The vertex store contract.

use thiserror::Error;
use vsync_types::{
    Hash, HighQc, QuorumCertificate, TimeoutCertificate, VertexChain, VertexStoreState,
    VerifiedVertex,
};

/// Errors from vertex store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VertexStoreError {
    /// A vertex was inserted before its parent.
    #[error("Vertex {vertex_id:?} is missing parent {parent_id:?}")]
    MissingParent {
        /// The vertex being inserted.
        vertex_id: Hash,
        /// Its absent parent.
        parent_id: Hash,
    },
}

/// Holds the speculative chain of vertices rooted at the last committed vertex.
///
/// All methods are synchronous and called from the single task that owns
/// the sync state machine.
pub trait VertexStore {
    /// Check whether the vertex is the root or one of the stored vertices.
    fn contains_vertex(&self, vertex_id: &Hash) -> bool;

    /// Record a QC.
    ///
    /// Returns `false` if the certified vertex is not in the store, in which
    /// case the QC cannot be absorbed without fetching ancestors. Otherwise
    /// updates the high QC, commits what the QC commits, and returns `true`.
    fn add_qc(&mut self, qc: &QuorumCertificate) -> bool;

    /// Insert a chain of vertices, oldest first.
    ///
    /// Each vertex's QC is recorded before the vertex itself. Insertion stops
    /// at the first vertex whose QC cannot be absorbed.
    fn insert_vertex_chain(&mut self, chain: VertexChain) -> Result<(), VertexStoreError>;

    /// Atomically replace the store's contents.
    ///
    /// Returns `false`, leaving the store untouched, if the new state's
    /// vertices do not form a tree on its root.
    fn try_rebuild(&mut self, state: VertexStoreState) -> bool;

    /// The committed root vertex.
    fn root(&self) -> &VerifiedVertex;

    /// Highest QC, highest committed QC and highest timeout certificate.
    fn high_qc(&self) -> HighQc;

    /// Highest timeout certificate inserted so far.
    fn highest_timeout_certificate(&self) -> Option<&TimeoutCertificate>;

    /// Record a timeout certificate, keeping only the highest.
    fn insert_timeout_certificate(&mut self, tc: TimeoutCertificate);

    /// `count` vertices starting at `vertex_id` and walking parents.
    ///
    /// Returns `None` unless every requested vertex is stored.
    fn get_vertices(&self, vertex_id: &Hash, count: usize) -> Option<Vec<VerifiedVertex>>;
}
