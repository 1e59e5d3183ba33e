//! Quorum certificate types.

use crate::{Hash, LedgerHeader, LedgerProof, ValidatorId, View};
use serde::{Deserialize, Serialize};

/// Consensus metadata of a single vertex as referenced by votes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BftHeader {
    /// View the vertex was proposed in.
    pub view: View,

    /// Id of the vertex.
    pub vertex_id: Hash,

    /// Ledger state after executing the vertex.
    pub ledger_header: LedgerHeader,
}

impl BftHeader {
    /// Create a new header.
    pub fn new(view: View, vertex_id: Hash, ledger_header: LedgerHeader) -> Self {
        Self {
            view,
            vertex_id,
            ledger_header,
        }
    }
}

/// The data validators sign when voting for a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteData {
    /// The vertex being voted for.
    pub proposed: BftHeader,

    /// Parent of the proposed vertex.
    pub parent: BftHeader,

    /// Vertex committed by this vote, if the vote completes a commit chain.
    pub committed: Option<BftHeader>,
}

impl VoteData {
    /// Create new vote data.
    pub fn new(proposed: BftHeader, parent: BftHeader, committed: Option<BftHeader>) -> Self {
        Self {
            proposed,
            parent,
            committed,
        }
    }

    /// Hash over the identifying fields of the vote.
    pub fn hash(&self) -> Hash {
        let committed = self
            .committed
            .as_ref()
            .map(|header| header.vertex_id)
            .unwrap_or(Hash::ZERO);
        Hash::from_parts(&[
            b"vote_data:",
            &self.proposed.view.0.to_le_bytes(),
            self.proposed.vertex_id.as_bytes(),
            self.parent.vertex_id.as_bytes(),
            committed.as_bytes(),
        ])
    }
}

/// Aggregated attestation that a quorum voted for `vote_data.proposed`.
///
/// Signature aggregation and validation happen before a QC reaches sync;
/// here only the signer identities are kept so they can serve as fetch
/// targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuorumCertificate {
    /// What the quorum voted for.
    pub vote_data: VoteData,

    /// Validators that contributed signatures, in signing order.
    pub signers: Vec<ValidatorId>,
}

impl QuorumCertificate {
    /// Create a new QC.
    pub fn new(vote_data: VoteData, signers: Vec<ValidatorId>) -> Self {
        Self { vote_data, signers }
    }

    /// Create the genesis QC for the given genesis vertex header.
    ///
    /// The genesis vertex is its own parent and commits itself.
    pub fn genesis(genesis: BftHeader) -> Self {
        Self::new(
            VoteData::new(genesis.clone(), genesis.clone(), Some(genesis)),
            vec![],
        )
    }

    /// View of the certified vertex.
    pub fn view(&self) -> View {
        self.vote_data.proposed.view
    }

    /// Header of the certified vertex.
    pub fn proposed(&self) -> &BftHeader {
        &self.vote_data.proposed
    }

    /// Header of the certified vertex's parent.
    pub fn parent(&self) -> &BftHeader {
        &self.vote_data.parent
    }

    /// Header committed by this QC, if any.
    pub fn committed(&self) -> Option<&BftHeader> {
        self.vote_data.committed.as_ref()
    }

    /// Validators that signed this QC.
    pub fn signers(&self) -> &[ValidatorId] {
        &self.signers
    }

    /// The committed header together with a ledger proof for its state.
    ///
    /// Returns `None` if this QC does not commit anything.
    pub fn committed_and_ledger_proof(&self) -> Option<(BftHeader, LedgerProof)> {
        let committed = self.vote_data.committed.as_ref()?;
        let proof = LedgerProof::new(
            self.vote_data.hash(),
            committed.ledger_header.clone(),
            self.signers.clone(),
        );
        Some((committed.clone(), proof))
    }
}
