//! Timeout certificate type for liveness.

use crate::{Epoch, ValidatorId, View};
use serde::{Deserialize, Serialize};

/// Certificate proving a quorum timed out `view` without forming a QC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeoutCertificate {
    /// Epoch of the timed out view.
    pub epoch: Epoch,

    /// The view that timed out.
    pub view: View,

    /// Validators whose timeout votes form the certificate.
    pub signers: Vec<ValidatorId>,
}

impl TimeoutCertificate {
    /// Create a new timeout certificate.
    pub fn new(epoch: Epoch, view: View, signers: Vec<ValidatorId>) -> Self {
        Self {
            epoch,
            view,
            signers,
        }
    }

    /// Get the number of signers.
    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }
}
