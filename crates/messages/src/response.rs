//! Vertex fetch responses.

use crate::request::GetVerticesRequest;
use serde::{Deserialize, Serialize};
use vsync_types::{HighQc, NetworkMessage, VerifiedVertex};

/// Vertices answering a [`GetVerticesRequest`], newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVerticesResponse {
    /// Requested vertices: the requested vertex followed by its ancestors.
    pub vertices: Vec<VerifiedVertex>,
}

impl GetVerticesResponse {
    /// Create a new vertices response.
    pub fn new(vertices: Vec<VerifiedVertex>) -> Self {
        Self { vertices }
    }

    /// The request this response answers.
    ///
    /// Derived from the first vertex and the number of vertices. Returns `None`
    /// for an empty response, which answers nothing.
    pub fn request(&self) -> Option<GetVerticesRequest> {
        self.vertices
            .first()
            .map(|first| GetVerticesRequest::new(first.id(), self.vertices.len()))
    }
}

impl NetworkMessage for GetVerticesResponse {
    fn message_type_id() -> &'static str {
        "vertices.response"
    }
}

/// Refusal of a [`GetVerticesRequest`] the peer could not serve.
///
/// Carries the responder's high QC so the requester can tell whether the
/// network has moved past what it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVerticesErrorResponse {
    /// The request that could not be served.
    pub request: GetVerticesRequest,

    /// High QC of the responding node.
    pub high_qc: HighQc,
}

impl GetVerticesErrorResponse {
    /// Create a new error response.
    pub fn new(request: GetVerticesRequest, high_qc: HighQc) -> Self {
        Self { request, high_qc }
    }
}

impl NetworkMessage for GetVerticesErrorResponse {
    fn message_type_id() -> &'static str {
        "vertices.error_response"
    }
}
