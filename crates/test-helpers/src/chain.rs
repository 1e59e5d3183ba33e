//! Linear vertex chain fixtures.

use vsync_types::{
    AccumulatorState, BftHeader, Epoch, Hash, HighQc, LedgerHeader, LedgerProof,
    QuorumCertificate, TimeoutCertificate, ValidatorId, Vertex, VertexStoreState,
    VerifiedVertex, View, VoteData,
};

/// A chain of vertices at views `0..=tip`, one vertex per view.
///
/// Vertex 0 is genesis. Every vertex `v > 0` carries the QC on vertex `v - 1`,
/// applies one command (so its ledger state version equals its view), and
/// the QC on vertex `v` commits vertex `v - 2` under the three-chain rule.
/// All QCs are signed by every validator of the chain.
#[derive(Debug, Clone)]
pub struct TestChain {
    epoch: Epoch,
    validators: Vec<ValidatorId>,
    vertices: Vec<VerifiedVertex>,
    ledger_headers: Vec<LedgerHeader>,
    qcs: Vec<QuorumCertificate>,
}

impl TestChain {
    /// Build a chain up to view `tip`, signed by validators 0 to 3.
    pub fn new(tip: u64) -> Self {
        Self::with_validators(tip, (0..4).map(ValidatorId).collect())
    }

    /// Build a chain up to view `tip` signed by the given validators.
    ///
    /// # Panics
    ///
    /// Panics if `validators` is empty.
    pub fn with_validators(tip: u64, validators: Vec<ValidatorId>) -> Self {
        assert!(!validators.is_empty(), "a chain needs at least one signer");

        let epoch = Epoch(1);
        let genesis = VerifiedVertex::new(Vertex::genesis(epoch));
        let genesis_ledger = LedgerHeader::genesis(epoch);
        let genesis_qc = QuorumCertificate::genesis(genesis.header(genesis_ledger.clone()));

        let mut chain = Self {
            epoch,
            validators,
            vertices: vec![genesis],
            ledger_headers: vec![genesis_ledger],
            qcs: vec![genesis_qc],
        };

        let mut accumulator = AccumulatorState::genesis();
        for view in 1..=tip {
            let parent = (view - 1) as usize;
            let command = Hash::from_parts(&[b"command:", &view.to_le_bytes()]);
            let proposer = chain.validators[view as usize % chain.validators.len()];

            let vertex = VerifiedVertex::new(Vertex {
                view: View(view),
                qc: chain.qcs[parent].clone(),
                proposer: Some(proposer),
                timestamp: view * 1000,
                payload: vec![command],
            });

            accumulator = accumulator.accumulate(&command);
            let ledger_header = LedgerHeader::new(epoch, View(view), accumulator.clone(), view * 1000);

            let proposed = vertex.header(ledger_header.clone());
            let parent_header = chain.vertices[parent].header(chain.ledger_headers[parent].clone());
            let committed = view.checked_sub(2).map(|c| chain.header(c));
            let qc = QuorumCertificate::new(
                VoteData::new(proposed, parent_header, committed),
                chain.validators.clone(),
            );

            chain.vertices.push(vertex);
            chain.ledger_headers.push(ledger_header);
            chain.qcs.push(qc);
        }

        chain
    }

    /// Epoch of every vertex in the chain.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Validators signing the chain's QCs.
    pub fn validators(&self) -> &[ValidatorId] {
        &self.validators
    }

    /// View of the newest vertex.
    pub fn tip(&self) -> u64 {
        (self.vertices.len() - 1) as u64
    }

    /// The vertex at `view`.
    pub fn vertex(&self, view: u64) -> &VerifiedVertex {
        &self.vertices[view as usize]
    }

    /// Vertices at views `from..=to`, oldest first.
    pub fn vertices(&self, from: u64, to: u64) -> Vec<VerifiedVertex> {
        self.vertices[from as usize..=to as usize].to_vec()
    }

    /// `count` vertices starting at `view` and walking parents, as a peer
    /// answering a vertices request would send them.
    pub fn ancestors(&self, view: u64, count: usize) -> Vec<VerifiedVertex> {
        let oldest = view + 1 - count as u64;
        let mut vertices = self.vertices(oldest, view);
        vertices.reverse();
        vertices
    }

    /// Ledger state after the vertex at `view`.
    pub fn ledger_header(&self, view: u64) -> &LedgerHeader {
        &self.ledger_headers[view as usize]
    }

    /// BFT header of the vertex at `view`.
    pub fn header(&self, view: u64) -> BftHeader {
        self.vertex(view).header(self.ledger_header(view).clone())
    }

    /// The QC on the vertex at `view`.
    pub fn qc(&self, view: u64) -> &QuorumCertificate {
        &self.qcs[view as usize]
    }

    /// A QC on the vertex at `view` that commits that same vertex.
    ///
    /// Stores rooted at `view` start from this QC, the way a node restarting
    /// from a committed ledger state does.
    pub fn root_qc(&self, view: u64) -> QuorumCertificate {
        QuorumCertificate::genesis(self.header(view))
    }

    /// High QC whose highest QC is the QC on the vertex at `view`.
    pub fn high_qc(&self, view: u64) -> HighQc {
        let committed = if view >= 2 { self.qc(view) } else { self.qc(0) };
        HighQc::new(self.qc(view).clone(), committed.clone(), None)
            .expect("fixture QC commits a vertex")
    }

    /// High QC on the vertex at `view` whose committed QC is the QC on the
    /// vertex at `committed_qc`, so it commits the vertex at `committed_qc - 2`.
    pub fn high_qc_committing(&self, view: u64, committed_qc: u64) -> HighQc {
        HighQc::new(self.qc(view).clone(), self.qc(committed_qc).clone(), None)
            .expect("fixture QC commits a vertex")
    }

    /// Ledger proof for the state after the vertex at `view`.
    pub fn ledger_proof(&self, view: u64) -> LedgerProof {
        LedgerProof::new(
            self.root_qc(view).vote_data.hash(),
            self.ledger_header(view).clone(),
            self.validators.clone(),
        )
    }

    /// Ledger proof carried by the QC on the vertex at `view`, which commits
    /// the vertex at `view - 2`.
    pub fn committed_proof(&self, view: u64) -> LedgerProof {
        let (_, proof) = self
            .qc(view)
            .committed_and_ledger_proof()
            .expect("fixture QC commits a vertex");
        proof
    }

    /// Store contents rooted at `root` holding every vertex up to `tip`.
    pub fn store_state(&self, root: u64, tip: u64) -> VertexStoreState {
        let root_qc = self.root_qc(root);
        let highest_qc = if tip > root {
            self.qc(tip - 1).clone()
        } else {
            root_qc.clone()
        };
        let high_qc = HighQc::new(highest_qc, root_qc, None).expect("root QC commits the root");

        let vertices = if tip > root {
            self.vertices(root + 1, tip)
        } else {
            vec![]
        };
        VertexStoreState::new(high_qc, self.vertex(root).clone(), vertices, None)
    }

    /// Timeout certificate for `view`, signed by every validator.
    pub fn timeout_certificate(&self, view: View) -> TimeoutCertificate {
        TimeoutCertificate::new(self.epoch, view, self.validators.clone())
    }
}
