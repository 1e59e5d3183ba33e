//! Ledger header and proof types.
//!
//! A committed QC carries a [`LedgerHeader`] describing the ledger state at
//! the committed vertex. Sync compares headers to decide whether the local
//! ledger has caught up far enough to rebuild the vertex store on top of it.

use crate::{Epoch, Hash, ValidatorId, View};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ledger accumulator after applying a number of state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccumulatorState {
    /// Number of state transitions applied to the ledger.
    pub state_version: u64,

    /// Running hash over every applied transition.
    pub accumulator_hash: Hash,
}

impl AccumulatorState {
    /// Create a new accumulator state.
    pub fn new(state_version: u64, accumulator_hash: Hash) -> Self {
        Self {
            state_version,
            accumulator_hash,
        }
    }

    /// Accumulator of an empty ledger.
    pub fn genesis() -> Self {
        Self::new(0, Hash::ZERO)
    }

    /// Extend the accumulator with another transition.
    pub fn accumulate(&self, transition: &Hash) -> Self {
        Self {
            state_version: self.state_version + 1,
            accumulator_hash: Hash::from_parts(&[
                self.accumulator_hash.as_bytes(),
                transition.as_bytes(),
            ]),
        }
    }
}

/// Committed ledger state descriptor.
///
/// Headers are totally ordered by epoch and then state version, which is the
/// order in which the ledger advances. Remaining fields only break ties so that
/// the ordering agrees with equality and headers can be `BTreeMap` keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerHeader {
    /// Epoch the header belongs to.
    pub epoch: Epoch,

    /// View of the vertex that produced this state.
    pub view: View,

    /// Accumulator after the vertex was applied.
    pub accumulator: AccumulatorState,

    /// Proposal timestamp (milliseconds).
    pub timestamp: u64,
}

impl LedgerHeader {
    /// Create a new ledger header.
    pub fn new(epoch: Epoch, view: View, accumulator: AccumulatorState, timestamp: u64) -> Self {
        Self {
            epoch,
            view,
            accumulator,
            timestamp,
        }
    }

    /// Header of an empty ledger at the given epoch.
    pub fn genesis(epoch: Epoch) -> Self {
        Self::new(epoch, View::GENESIS, AccumulatorState::genesis(), 0)
    }

    /// State version of this header.
    pub fn state_version(&self) -> u64 {
        self.accumulator.state_version
    }
}

impl Ord for LedgerHeader {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.state_version().cmp(&other.state_version()))
            .then_with(|| self.view.cmp(&other.view))
            .then_with(|| {
                self.accumulator
                    .accumulator_hash
                    .cmp(&other.accumulator.accumulator_hash)
            })
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }
}

impl PartialOrd for LedgerHeader {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Proof that a ledger header was committed by a quorum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerProof {
    /// Hash of the vote data the signatures cover.
    pub opaque: Hash,

    /// The committed ledger header.
    pub ledger_header: LedgerHeader,

    /// Validators whose signatures form the proof.
    pub signers: Vec<ValidatorId>,
}

impl LedgerProof {
    /// Create a new ledger proof.
    pub fn new(opaque: Hash, ledger_header: LedgerHeader, signers: Vec<ValidatorId>) -> Self {
        Self {
            opaque,
            ledger_header,
            signers,
        }
    }

    /// Proof for the genesis ledger state.
    pub fn genesis(epoch: Epoch) -> Self {
        Self::new(Hash::ZERO, LedgerHeader::genesis(epoch), vec![])
    }

    /// View of the committed header.
    pub fn view(&self) -> View {
        self.ledger_header.view
    }

    /// State version of the committed header.
    pub fn state_version(&self) -> u64 {
        self.ledger_header.state_version()
    }

    /// The raw committed header.
    pub fn header(&self) -> &LedgerHeader {
        &self.ledger_header
    }

    /// Signers of this proof, excluding `validator`.
    pub fn signers_without(&self, validator: ValidatorId) -> Vec<ValidatorId> {
        self.signers
            .iter()
            .copied()
            .filter(|signer| *signer != validator)
            .collect()
    }
}
