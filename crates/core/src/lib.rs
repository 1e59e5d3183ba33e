//! Core types for BFT vertex synchronization.
//!
//! This crate provides the foundational types for the sync architecture:
//!
//! - [`Event`]: All possible inputs to the sync state machine
//! - [`Action`]: All possible outputs from the sync state machine
//! - [`StateMachine`]: The trait the sync state machine implements
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner which:
//! 1. Delivers events to the state machine
//! 2. Executes the returned actions against the network, pacemaker and ledger
//! 3. Turns expired timers back into events

mod action;
mod event;
mod message;
mod request;
mod traits;

pub use action::{Action, SyncResult};
pub use event::Event;
pub use message::OutboundMessage;
pub use request::RequestId;
pub use traits::StateMachine;

/// Timer identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Patience timer for an outstanding vertices request.
    /// Fires `Event::VertexRequestTimeout` for the same request.
    VertexRequest {
        /// The request the timer was armed for.
        request: vsync_messages::GetVerticesRequest,
    },
}
