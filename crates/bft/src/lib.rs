//! Vertex store for BFT consensus.
//!
//! This crate provides the store the sync state machine reconciles against:
//!
//! - [`VertexStore`]: the contract sync relies on (membership, QC insertion,
//!   chain insertion, atomic rebuild, high QC and timeout certificates)
//! - [`InMemoryVertexStore`]: a store holding the uncommitted chain in memory,
//!   pruning on commit
//! - [`serve_vertices_request`]: answers peers' vertices requests from a store

mod memory;
mod server;
mod store;

pub use memory::InMemoryVertexStore;
pub use server::serve_vertices_request;
pub use store::{VertexStore, VertexStoreError};
