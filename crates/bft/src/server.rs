//! Serving vertices to syncing peers.

use crate::store::VertexStore;
use tracing::{debug, trace};
use vsync_messages::{GetVerticesErrorResponse, GetVerticesRequest, GetVerticesResponse};

/// Answer a peer's vertices request from the local store.
///
/// Replies with the requested vertex and its ancestors when all `count` of
/// them are stored. Otherwise refuses, attaching the local high QC so the
/// requester can tell whether it is chasing a stale target.
pub fn serve_vertices_request<S: VertexStore + ?Sized>(
    store: &S,
    request: &GetVerticesRequest,
) -> Result<GetVerticesResponse, GetVerticesErrorResponse> {
    if request.count == 0 {
        debug!(%request, "Refusing empty vertices request");
        return Err(GetVerticesErrorResponse::new(*request, store.high_qc()));
    }

    match store.get_vertices(&request.vertex_id, request.count) {
        Some(vertices) => {
            trace!(%request, "Serving vertices");
            Ok(GetVerticesResponse::new(vertices))
        }
        None => {
            debug!(
                %request,
                root_view = store.root().view().0,
                "Cannot serve vertices request"
            );
            Err(GetVerticesErrorResponse::new(*request, store.high_qc()))
        }
    }
}
