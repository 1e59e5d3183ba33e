//! Vertex fetch requests.

use crate::response::GetVerticesResponse;
use serde::{Deserialize, Serialize};
use std::fmt;
use vsync_types::{Hash, NetworkMessage, Request};

/// Request for `count` vertices, walking parents starting at `vertex_id`.
///
/// Also serves as the key for outstanding requests: two syncs needing the
/// same ancestor range share one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GetVerticesRequest {
    /// Id of the newest vertex wanted.
    pub vertex_id: Hash,

    /// Number of vertices wanted, including `vertex_id` itself.
    pub count: usize,
}

impl GetVerticesRequest {
    /// Create a new vertices request.
    pub fn new(vertex_id: Hash, count: usize) -> Self {
        Self { vertex_id, count }
    }
}

impl fmt::Display for GetVerticesRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GetVertices({}, count={})", self.vertex_id, self.count)
    }
}

// Network message implementation
impl NetworkMessage for GetVerticesRequest {
    fn message_type_id() -> &'static str {
        "vertices.request"
    }
}

/// GetVerticesRequest expects GetVerticesResponse.
impl Request for GetVerticesRequest {
    type Response = GetVerticesResponse;
}
