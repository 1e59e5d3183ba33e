//! Results of view voting.

use crate::{QuorumCertificate, TimeoutCertificate, ValidatorId, View};
use serde::{Deserialize, Serialize};

/// What a view's votes produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewVotingResult {
    /// A quorum voted for a vertex.
    FormedQc(QuorumCertificate),

    /// A quorum timed out the view.
    FormedTc(TimeoutCertificate),
}

impl ViewVotingResult {
    /// View the result was formed for.
    pub fn view(&self) -> View {
        match self {
            ViewVotingResult::FormedQc(qc) => qc.view(),
            ViewVotingResult::FormedTc(tc) => tc.view,
        }
    }
}

/// A quorum was reached for a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuorumReached {
    /// The formed certificate.
    pub voting_result: ViewVotingResult,

    /// Author of the last vote that completed the quorum.
    pub last_author: ValidatorId,
}

impl ViewQuorumReached {
    /// Create a new quorum notification.
    pub fn new(voting_result: ViewVotingResult, last_author: ValidatorId) -> Self {
        Self {
            voting_result,
            last_author,
        }
    }
}
