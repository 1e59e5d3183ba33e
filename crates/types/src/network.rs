//! Network message traits.

/// A message that travels between validators.
pub trait NetworkMessage {
    /// Stable identifier for the message type, used for routing and logs.
    fn message_type_id() -> &'static str;
}

/// A request with a typed response.
pub trait Request: NetworkMessage {
    /// The message a peer answers this request with.
    type Response: NetworkMessage;
}
