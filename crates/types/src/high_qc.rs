//! Best known consensus progress.

use crate::{BftHeader, LedgerProof, QuorumCertificate, TimeoutCertificate, View};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a [`HighQc`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HighQcError {
    /// The highest committed QC does not actually commit a vertex.
    #[error("Highest committed QC at {view} carries no commit")]
    MissingCommit {
        /// View of the offending QC.
        view: View,
    },
}

/// Highest QC, highest committed QC and highest timeout certificate known to
/// a node.
///
/// The committed QC is checked at construction to carry a commit, so
/// [`HighQc::committed_header_and_proof`] is infallible. Deserialization goes
/// through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "HighQcParts")]
pub struct HighQc {
    highest_qc: QuorumCertificate,
    highest_committed_qc: QuorumCertificate,
    highest_tc: Option<TimeoutCertificate>,
}

/// Unchecked wire form of a [`HighQc`].
#[derive(Deserialize)]
struct HighQcParts {
    highest_qc: QuorumCertificate,
    highest_committed_qc: QuorumCertificate,
    highest_tc: Option<TimeoutCertificate>,
}

impl TryFrom<HighQcParts> for HighQc {
    type Error = HighQcError;

    fn try_from(parts: HighQcParts) -> Result<Self, Self::Error> {
        Self::new(parts.highest_qc, parts.highest_committed_qc, parts.highest_tc)
    }
}

impl HighQc {
    /// Create a new high QC triple.
    pub fn new(
        highest_qc: QuorumCertificate,
        highest_committed_qc: QuorumCertificate,
        highest_tc: Option<TimeoutCertificate>,
    ) -> Result<Self, HighQcError> {
        if highest_committed_qc.committed().is_none() {
            return Err(HighQcError::MissingCommit {
                view: highest_committed_qc.view(),
            });
        }

        Ok(Self {
            highest_qc,
            highest_committed_qc,
            highest_tc,
        })
    }

    /// High QC where a single committing QC is both highest and highest committed.
    pub fn from_committed(qc: QuorumCertificate) -> Result<Self, HighQcError> {
        Self::new(qc.clone(), qc, None)
    }

    /// Same progress with a different highest QC.
    pub fn with_highest_qc(&self, highest_qc: QuorumCertificate) -> Self {
        Self {
            highest_qc,
            highest_committed_qc: self.highest_committed_qc.clone(),
            highest_tc: self.highest_tc.clone(),
        }
    }

    /// Same progress with a new highest committing QC.
    pub fn with_committed_qc(
        &self,
        highest_committed_qc: QuorumCertificate,
    ) -> Result<Self, HighQcError> {
        Self::new(
            self.highest_qc.clone(),
            highest_committed_qc,
            self.highest_tc.clone(),
        )
    }

    /// Same progress with a different highest timeout certificate.
    pub fn with_highest_tc(&self, highest_tc: Option<TimeoutCertificate>) -> Self {
        Self {
            highest_qc: self.highest_qc.clone(),
            highest_committed_qc: self.highest_committed_qc.clone(),
            highest_tc,
        }
    }

    /// The highest QC.
    pub fn highest_qc(&self) -> &QuorumCertificate {
        &self.highest_qc
    }

    /// The highest committing QC.
    pub fn highest_committed_qc(&self) -> &QuorumCertificate {
        &self.highest_committed_qc
    }

    /// The highest timeout certificate, if any.
    pub fn highest_tc(&self) -> Option<&TimeoutCertificate> {
        self.highest_tc.as_ref()
    }

    /// Header committed by the highest committed QC and a proof of its ledger state.
    pub fn committed_header_and_proof(&self) -> (BftHeader, LedgerProof) {
        self.highest_committed_qc
            .committed_and_ledger_proof()
            .expect("HighQc invariant: highest committed QC carries a commit")
    }
}
