//! Core types for BFT vertex synchronization.
//!
//! Vertices, quorum certificates and ledger headers as seen by the sync
//! subsystem. Cryptographic validation happens before these values reach
//! sync, so certificates carry signer identities but no signature material.

mod certificate;
mod hash;
mod high_qc;
mod identifiers;
mod ledger;
mod network;
mod timeout;
mod vertex;
mod voting;

pub use certificate::{BftHeader, QuorumCertificate, VoteData};
pub use hash::{Hash, HexError};
pub use high_qc::{HighQc, HighQcError};
pub use identifiers::{Epoch, ValidatorId, View};
pub use ledger::{AccumulatorState, LedgerHeader, LedgerProof};
pub use network::{NetworkMessage, Request};
pub use timeout::TimeoutCertificate;
pub use vertex::{Vertex, VertexChain, VertexChainError, VertexStoreState, VerifiedVertex};
pub use voting::{ViewQuorumReached, ViewVotingResult};
