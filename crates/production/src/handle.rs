//! Cloneable handle for talking to a running sync state machine.

use crate::runner::RunnerMessage;
use crate::RunnerError;
use tokio::sync::{mpsc, oneshot};
use vsync_bft_sync::SyncCounters;
use vsync_core::{Event, SyncResult};
use vsync_types::{HighQc, ValidatorId};

/// Handle to a [`SyncRunner`](crate::SyncRunner).
///
/// Messages are processed in the order they are sent. The runner stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    mailbox: mpsc::Sender<RunnerMessage>,
}

impl SyncHandle {
    pub(crate) fn new(mailbox: mpsc::Sender<RunnerMessage>) -> Self {
        Self { mailbox }
    }

    /// Ask the runner to bring local state up to `high_qc`.
    ///
    /// Resolves once the request has been classified, not once the sync
    /// completes.
    pub async fn sync_to_qc(
        &self,
        high_qc: HighQc,
        author: Option<ValidatorId>,
    ) -> Result<SyncResult, RunnerError> {
        let (reply, result) = oneshot::channel();
        self.send(RunnerMessage::SyncToQc {
            high_qc,
            author,
            reply,
        })
        .await?;
        result.await.map_err(|_| RunnerError::ReplyDropped)
    }

    /// Deliver an inbound event.
    pub async fn submit(&self, event: Event) -> Result<(), RunnerError> {
        self.send(RunnerMessage::Event(event)).await
    }

    /// Snapshot of the sync counters, taken after every message sent before it.
    pub async fn counters(&self) -> Result<SyncCounters, RunnerError> {
        let (reply, counters) = oneshot::channel();
        self.send(RunnerMessage::Counters { reply }).await?;
        counters.await.map_err(|_| RunnerError::ReplyDropped)
    }

    async fn send(&self, message: RunnerMessage) -> Result<(), RunnerError> {
        self.mailbox
            .send(message)
            .await
            .map_err(|_| RunnerError::MailboxClosed)
    }
}
