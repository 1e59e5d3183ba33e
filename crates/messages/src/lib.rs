//! Messages exchanged by the vertex sync protocol.

pub mod ledger;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use ledger::{LedgerUpdate, LocalSyncRequest};
pub use request::GetVerticesRequest;
pub use response::{GetVerticesErrorResponse, GetVerticesResponse};
