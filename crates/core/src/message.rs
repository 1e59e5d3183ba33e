//! Outbound message types for network communication.

use vsync_messages::{GetVerticesErrorResponse, GetVerticesRequest, GetVerticesResponse};
use vsync_types::NetworkMessage;

/// Outbound network messages.
///
/// These are the messages the sync state machine can send to other nodes.
/// The runner handles the actual network I/O.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Ask a peer for vertices.
    GetVerticesRequest(GetVerticesRequest),

    /// Serve vertices to a peer.
    GetVerticesResponse(GetVerticesResponse),

    /// Refuse a peer's vertices request.
    GetVerticesErrorResponse(Box<GetVerticesErrorResponse>),
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::GetVerticesRequest(_) => GetVerticesRequest::message_type_id(),
            OutboundMessage::GetVerticesResponse(_) => GetVerticesResponse::message_type_id(),
            OutboundMessage::GetVerticesErrorResponse(_) => {
                GetVerticesErrorResponse::message_type_id()
            }
        }
    }

    /// Check if this message answers a peer's request.
    pub fn is_response(&self) -> bool {
        !matches!(self, OutboundMessage::GetVerticesRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsync_types::Hash;

    #[test]
    fn test_type_names() {
        let request = OutboundMessage::GetVerticesRequest(GetVerticesRequest::new(Hash::ZERO, 1));
        assert_eq!(request.type_name(), "vertices.request");
        assert!(!request.is_response());

        let response = OutboundMessage::GetVerticesResponse(GetVerticesResponse::new(vec![]));
        assert_eq!(response.type_name(), "vertices.response");
        assert!(response.is_response());
    }
}
