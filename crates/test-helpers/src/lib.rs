//! Test fixtures for vertex sync.
//!
//! [`TestChain`] builds a linear chain of vertices with matching QCs and
//! ledger headers, so tests can stand up stores at any root and hand out the
//! certificates a peer would send.

mod chain;

pub use chain::TestChain;
