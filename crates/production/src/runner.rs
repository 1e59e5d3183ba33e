//! Tokio actor owning one sync state machine.

use crate::network::InboundRateLimiter;
use crate::{Collaborators, RunnerConfig, RunnerError, SyncHandle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use vsync_bft::VertexStore;
use vsync_bft_sync::{BftSync, SyncCounters};
use vsync_core::{Action, Event, RequestId, StateMachine, SyncResult, TimerId};
use vsync_types::{HighQc, LedgerProof, ValidatorId};

/// Messages accepted by the runner's mailbox.
#[derive(Debug)]
pub(crate) enum RunnerMessage {
    Event(Event),
    SyncToQc {
        high_qc: HighQc,
        author: Option<ValidatorId>,
        reply: oneshot::Sender<SyncResult>,
    },
    Counters {
        reply: oneshot::Sender<SyncCounters>,
    },
}

/// Drives a [`BftSync`] from a single task.
///
/// Every entry point goes through the mailbox, so the state machine only ever
/// sees one event at a time. Timers are spawned tasks that post their timeout
/// back into the same mailbox.
pub struct SyncRunner<S: VertexStore> {
    sync: BftSync<S>,
    collaborators: Collaborators,
    inbound_limiter: InboundRateLimiter,
    mailbox: mpsc::Receiver<RunnerMessage>,
    /// Weak so that outstanding timers never keep the runner alive.
    timers: mpsc::WeakSender<RunnerMessage>,
    /// Callers waiting for a `SyncToQc` result.
    pending: HashMap<RequestId, oneshot::Sender<SyncResult>>,
    next_request_id: RequestId,
    started: Instant,
}

impl<S: VertexStore + Send + 'static> SyncRunner<S> {
    /// Start a runner on the current tokio runtime.
    ///
    /// `validators` get the validator inbound limits; every other peer gets
    /// the unknown-peer limits.
    pub fn spawn(
        config: RunnerConfig,
        self_id: ValidatorId,
        validators: Vec<ValidatorId>,
        store: S,
        ledger_proof: LedgerProof,
        collaborators: Collaborators,
    ) -> Result<(SyncHandle, JoinHandle<()>), RunnerError> {
        config.validate()?;

        let (sender, mailbox) = mpsc::channel(config.mailbox_capacity);
        let runner = Self {
            sync: BftSync::new(self_id, store, ledger_proof, config.sync),
            collaborators,
            inbound_limiter: InboundRateLimiter::new(config.inbound_rate_limit, validators),
            mailbox,
            timers: sender.downgrade(),
            pending: HashMap::new(),
            next_request_id: RequestId::new(0),
            started: Instant::now(),
        };

        info!(validator = self_id.0, "Starting sync runner");
        let task = tokio::spawn(runner.run());
        Ok((SyncHandle::new(sender), task))
    }

    async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            self.sync.set_time(self.started.elapsed());
            self.dispatch(message);
        }
        debug!(
            waiting_callers = self.pending.len(),
            "Sync runner stopped, all handles dropped"
        );
    }

    fn dispatch(&mut self, message: RunnerMessage) {
        match message {
            RunnerMessage::Event(event) => {
                if let Event::GetVerticesRequestReceived { from, request } = &event {
                    if !self.inbound_limiter.check_request(*from) {
                        warn!(from = from.0, %request, "Vertices request rate limited");
                        return;
                    }
                }
                trace!(event = event.type_name(), "Handling event");
                let actions = self.sync.handle(event);
                self.execute(actions);
            }
            RunnerMessage::SyncToQc {
                high_qc,
                author,
                reply,
            } => {
                let request_id = self.next_request_id;
                self.next_request_id = request_id.next();
                self.pending.insert(request_id, reply);

                let actions = self.sync.handle(Event::SyncToQc {
                    high_qc,
                    author,
                    request_id,
                });
                self.execute(actions);
            }
            RunnerMessage::Counters { reply } => {
                let _ = reply.send(self.sync.counters());
            }
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SendToValidator { to, message } => {
                    trace!(to = to.0, message = message.type_name(), "Sending message");
                    self.collaborators.network.send(to, message);
                }
                Action::SetTimer { id, duration } => self.set_timer(id, duration),
                Action::ProcessHighQc { high_qc } => {
                    self.collaborators.pacemaker.process_high_qc(high_qc);
                }
                Action::RequestLedgerSync { request } => {
                    self.collaborators.ledger.request_sync(request);
                }
                Action::EmitSyncResult { request_id, result } => {
                    match self.pending.remove(&request_id) {
                        Some(reply) => {
                            if reply.send(result).is_err() {
                                debug!(%request_id, %result, "Caller stopped waiting for sync result");
                            }
                        }
                        None => warn!(%request_id, "Sync result for unknown request"),
                    }
                }
            }
        }
    }

    fn set_timer(&self, id: TimerId, duration: Duration) {
        let TimerId::VertexRequest { request } = id;
        let mailbox = self.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let Some(mailbox) = mailbox.upgrade() else {
                return;
            };
            let _ = mailbox
                .send(RunnerMessage::Event(Event::VertexRequestTimeout { request }))
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InboundRateLimitConfig;
    use crate::{LedgerSync, Network, Pacemaker};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;
    use vsync_bft::{serve_vertices_request, InMemoryVertexStore};
    use vsync_bft_sync::{ConfigError, SyncConfig};
    use vsync_core::OutboundMessage;
    use vsync_messages::{GetVerticesRequest, LedgerUpdate, LocalSyncRequest};
    use vsync_test_helpers::TestChain;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(ValidatorId, OutboundMessage)>>,
        high_qcs: Mutex<Vec<HighQc>>,
        ledger_syncs: Mutex<Vec<LocalSyncRequest>>,
    }

    impl Recorder {
        fn take_requests(&self) -> Vec<(ValidatorId, GetVerticesRequest)> {
            let mut sent = self.sent.lock();
            let requests = sent
                .iter()
                .filter_map(|(to, message)| match message {
                    OutboundMessage::GetVerticesRequest(request) => Some((*to, *request)),
                    _ => None,
                })
                .collect();
            sent.retain(|(_, message)| !matches!(message, OutboundMessage::GetVerticesRequest(_)));
            requests
        }
    }

    impl Network for Recorder {
        fn send(&self, to: ValidatorId, message: OutboundMessage) {
            self.sent.lock().push((to, message));
        }
    }

    impl Pacemaker for Recorder {
        fn process_high_qc(&self, high_qc: HighQc) {
            self.high_qcs.lock().push(high_qc);
        }
    }

    impl LedgerSync for Recorder {
        fn request_sync(&self, request: LocalSyncRequest) {
            self.ledger_syncs.lock().push(request);
        }
    }

    fn spawn_runner(
        chain: &TestChain,
        root: u64,
        tip: u64,
        config: RunnerConfig,
    ) -> (SyncHandle, JoinHandle<()>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let collaborators = Collaborators {
            network: recorder.clone(),
            pacemaker: recorder.clone(),
            ledger: recorder.clone(),
        };
        let store = InMemoryVertexStore::new(chain.store_state(root, tip)).unwrap();
        let (handle, task) = SyncRunner::spawn(
            config,
            ValidatorId(0),
            chain.validators().to_vec(),
            store,
            chain.ledger_proof(root),
            collaborators,
        )
        .unwrap();
        (handle, task, recorder)
    }

    /// Answer every recorded vertices request from `peer`.
    async fn answer_requests(handle: &SyncHandle, recorder: &Recorder, peer: &InMemoryVertexStore) {
        for (to, request) in recorder.take_requests() {
            let response = serve_vertices_request(peer, &request).unwrap();
            handle
                .submit(Event::GetVerticesResponseReceived { from: to, response })
                .await
                .unwrap();
        }
        // Everything submitted above has been handled once this returns
        handle.counters().await.unwrap();
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_qc_sync_through_runner() {
        let chain = TestChain::new(8);
        let peer = InMemoryVertexStore::new(chain.store_state(0, 8)).unwrap();
        let (handle, _task, recorder) = spawn_runner(&chain, 5, 5, RunnerConfig::default());
        let target = chain.high_qc_committing(8, 7);

        let result = handle.sync_to_qc(target.clone(), Some(ValidatorId(1))).await.unwrap();
        assert_eq!(result, SyncResult::InProgress);

        for _ in 0..3 {
            answer_requests(&handle, &recorder, &peer).await;
        }

        assert_eq!(recorder.high_qcs.lock().len(), 1);
        assert!(recorder.take_requests().is_empty());

        let result = handle.sync_to_qc(target, None).await.unwrap();
        assert_eq!(result, SyncResult::Synced);
        assert_eq!(handle.counters().await.unwrap().requests_sent, 3);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_timer_retries_request() {
        let chain = TestChain::new(8);
        let (handle, _task, recorder) = spawn_runner(&chain, 5, 5, RunnerConfig::default());

        handle
            .sync_to_qc(chain.high_qc_committing(8, 7), Some(ValidatorId(1)))
            .await
            .unwrap();
        assert_eq!(recorder.take_requests().len(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;

        let counters = handle.counters().await.unwrap();
        assert_eq!(counters.request_timeouts, 1);
        let retried = recorder.take_requests();
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].1, GetVerticesRequest::new(chain.vertex(8).id(), 1));
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_ledger_sync_through_runner() {
        let chain = TestChain::new(12);
        let peer = InMemoryVertexStore::new(chain.store_state(0, 12)).unwrap();
        let (handle, _task, recorder) = spawn_runner(&chain, 2, 2, RunnerConfig::default());

        handle
            .sync_to_qc(chain.high_qc(12), Some(ValidatorId(1)))
            .await
            .unwrap();
        answer_requests(&handle, &recorder, &peer).await;

        assert_eq!(recorder.ledger_syncs.lock().len(), 1);
        assert!(recorder.high_qcs.lock().is_empty());

        handle
            .submit(Event::LedgerUpdated {
                update: LedgerUpdate::new(chain.committed_proof(12)),
            })
            .await
            .unwrap();
        assert_eq!(handle.counters().await.unwrap().rebuilds, 1);
        assert!(!recorder.high_qcs.lock().is_empty());

        let result = handle.sync_to_qc(chain.high_qc(12), None).await.unwrap();
        assert_eq!(result, SyncResult::Synced);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_inbound_requests_rate_limited() {
        let chain = TestChain::new(8);
        let limits = InboundRateLimitConfig {
            validator_burst: 2,
            ..InboundRateLimitConfig::default()
        };
        let config = RunnerConfig::default().with_inbound_rate_limit(limits);
        let (handle, _task, recorder) = spawn_runner(&chain, 0, 8, config);

        let request = GetVerticesRequest::new(chain.vertex(8).id(), 2);
        for _ in 0..3 {
            handle
                .submit(Event::GetVerticesRequestReceived {
                    from: ValidatorId(1),
                    request,
                })
                .await
                .unwrap();
        }
        handle.counters().await.unwrap();

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(to, message)| {
            *to == ValidatorId(1) && matches!(message, OutboundMessage::GetVerticesResponse(_))
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_rejects_invalid_config() {
        let chain = TestChain::new(2);
        let recorder = Arc::new(Recorder::default());
        let collaborators = Collaborators {
            network: recorder.clone(),
            pacemaker: recorder.clone(),
            ledger: recorder,
        };
        let config = RunnerConfig::default()
            .with_sync(SyncConfig::default().with_request_patience(Duration::ZERO));

        let result = SyncRunner::spawn(
            config,
            ValidatorId(0),
            vec![],
            InMemoryVertexStore::new(chain.store_state(0, 0)).unwrap(),
            chain.ledger_proof(0),
            collaborators,
        );
        assert!(matches!(
            result,
            Err(RunnerError::Config(ConfigError::ZeroPatience))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_stopped_runner() {
        let chain = TestChain::new(2);
        let (handle, task, _recorder) = spawn_runner(&chain, 0, 0, RunnerConfig::default());

        task.abort();
        let _ = task.await;

        let err = handle.counters().await.unwrap_err();
        assert!(matches!(err, RunnerError::MailboxClosed));
    }
}
