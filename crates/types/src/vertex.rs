//! Vertex types for the speculative consensus chain.

use crate::{
    BftHeader, Epoch, Hash, HighQc, LedgerHeader, QuorumCertificate, TimeoutCertificate,
    ValidatorId, View, VoteData,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A proposal in the consensus chain.
///
/// A vertex points at its parent through the QC it carries: the parent is the
/// vertex that QC certifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    /// View the vertex was proposed in.
    pub view: View,

    /// QC certifying the parent vertex.
    pub qc: QuorumCertificate,

    /// Validator that proposed this vertex (None for genesis and fallback vertices).
    pub proposer: Option<ValidatorId>,

    /// Unix timestamp (milliseconds) when the vertex was proposed.
    pub timestamp: u64,

    /// Hashes of the commands carried by the vertex.
    pub payload: Vec<Hash>,
}

impl Vertex {
    /// Compute the id of this vertex.
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(96 + self.payload.len() * Hash::BYTES);
        bytes.extend_from_slice(b"vertex:");
        bytes.extend_from_slice(&self.view.0.to_le_bytes());
        bytes.extend_from_slice(self.qc.vote_data.hash().as_bytes());
        bytes.extend_from_slice(&self.proposer.map(|p| p.0 + 1).unwrap_or(0).to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        for command in &self.payload {
            bytes.extend_from_slice(command.as_bytes());
        }
        Hash::from_bytes(&bytes)
    }

    /// Id of the parent vertex.
    pub fn parent_id(&self) -> Hash {
        self.qc.proposed().vertex_id
    }

    /// Check if this is the genesis vertex.
    pub fn is_genesis(&self) -> bool {
        self.view.is_genesis()
    }

    /// Create a genesis vertex for the given epoch.
    ///
    /// Genesis has no real parent; its QC references the zero hash.
    pub fn genesis(epoch: Epoch) -> Self {
        let nothing = BftHeader::new(View::GENESIS, Hash::ZERO, LedgerHeader::genesis(epoch));
        Self {
            view: View::GENESIS,
            qc: QuorumCertificate::new(VoteData::new(nothing.clone(), nothing, None), vec![]),
            proposer: None,
            timestamp: 0,
            payload: vec![],
        }
    }
}

/// A vertex whose id has been computed (and whose QC has been verified
/// upstream).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifiedVertex {
    vertex: Vertex,
    id: Hash,
}

impl VerifiedVertex {
    /// Wrap a vertex, computing its id.
    pub fn new(vertex: Vertex) -> Self {
        let id = vertex.hash();
        Self { vertex, id }
    }

    /// Vertex id.
    pub fn id(&self) -> Hash {
        self.id
    }

    /// Vertex view.
    pub fn view(&self) -> View {
        self.vertex.view
    }

    /// Id of the parent vertex.
    pub fn parent_id(&self) -> Hash {
        self.vertex.parent_id()
    }

    /// QC certifying the parent.
    pub fn qc(&self) -> &QuorumCertificate {
        &self.vertex.qc
    }

    /// The wrapped vertex.
    pub fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    /// Header referencing this vertex with the ledger state it produced.
    pub fn header(&self, ledger_header: LedgerHeader) -> BftHeader {
        BftHeader::new(self.view(), self.id, ledger_header)
    }
}

/// Errors building a [`VertexChain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VertexChainError {
    /// A vertex does not extend the vertex before it.
    #[error("Vertex {vertex_id:?} at index {index} has parent {actual_parent:?}, expected {expected_parent:?}")]
    Discontinuous {
        /// Position of the offending vertex.
        index: usize,
        /// Id of the offending vertex.
        vertex_id: Hash,
        /// Id of the preceding vertex in the chain.
        expected_parent: Hash,
        /// Parent the vertex actually points at.
        actual_parent: Hash,
    },
}

/// Vertices ordered oldest first, each the parent of the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexChain {
    vertices: Vec<VerifiedVertex>,
}

impl VertexChain {
    /// Build a chain, checking parent links between consecutive vertices.
    pub fn new(vertices: Vec<VerifiedVertex>) -> Result<Self, VertexChainError> {
        for (index, pair) in vertices.windows(2).enumerate() {
            let (parent, child) = (&pair[0], &pair[1]);
            if child.parent_id() != parent.id() {
                return Err(VertexChainError::Discontinuous {
                    index: index + 1,
                    vertex_id: child.id(),
                    expected_parent: parent.id(),
                    actual_parent: child.parent_id(),
                });
            }
        }
        Ok(Self { vertices })
    }

    /// Vertices, oldest first.
    pub fn vertices(&self) -> &[VerifiedVertex] {
        &self.vertices
    }

    /// Number of vertices in the chain.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Consume the chain, returning its vertices.
    pub fn into_vertices(self) -> Vec<VerifiedVertex> {
        self.vertices
    }
}

/// Complete contents of a vertex store: a root and the vertices built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStoreState {
    /// High QC of the store.
    pub high_qc: HighQc,

    /// Committed root vertex.
    pub root: VerifiedVertex,

    /// Uncommitted vertices above the root, parents before children.
    pub vertices: Vec<VerifiedVertex>,

    /// Highest timeout certificate.
    pub highest_tc: Option<TimeoutCertificate>,
}

impl VertexStoreState {
    /// Create a new store state.
    pub fn new(
        high_qc: HighQc,
        root: VerifiedVertex,
        vertices: Vec<VerifiedVertex>,
        highest_tc: Option<TimeoutCertificate>,
    ) -> Self {
        Self {
            high_qc,
            root,
            vertices,
            highest_tc,
        }
    }
}
