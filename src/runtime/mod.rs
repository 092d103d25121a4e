//! Task orchestration actor and runtime facade.
//!
//! [`spawn_orchestrator`] starts one actor task that exclusively owns the
//! active session, the approval gate, the cancellation controller, the timer
//! and the history ledger. Frontends drive it through the cloneable
//! [`TaskOrchestrator`] handle and observe it through [`RuntimeEventStream`].
//!
//! Every fragment, decision, cancellation and notification result is applied
//! to the session inside the actor loop, one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::RemoteCollaborator;
use crate::approval::{deliver_decision, ApprovalDetector, ApprovalGate, ApprovalRequest};
use crate::config::Config;
use crate::error::{ConfigError, RunError};
use crate::textutil::single_line_preview;

mod cancel;
mod history;
mod reader;
mod schema;
mod session;
mod timer;
mod view;

pub use cancel::{CancelToken, CancellationController};
pub use history::{
    HistoryEntry, HistoryLedger, OutcomeClassifier, ResultStatus, CANCELLED_LABEL, ERRORED_LABEL,
};
pub use schema::*;
pub use session::{SessionHandle, SessionSnapshot, SessionState, NO_GENERATED_OUTPUT};
pub use timer::ExecutionTimer;
pub use view::{
    SessionView, CANCEL_BUSY_LABEL, CANCEL_LABEL, SUBMIT_BUSY_LABEL, SUBMIT_LABEL,
};

use reader::{spawn_stream_reader, ReaderMessage, ReaderUpdate};
use session::ExecutionSession;

/// Event stream receiver returned by [`spawn_orchestrator`].
pub type RuntimeEventStream = mpsc::UnboundedReceiver<RuntimeEventEnvelope>;

enum OrchestratorCommand {
    Submit {
        command_text: String,
        target_repo: String,
        reply: oneshot::Sender<Result<SessionHandle, RunError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    EditAction {
        text: String,
        reply: oneshot::Sender<bool>,
    },
    ResetEdit {
        reply: oneshot::Sender<bool>,
    },
    Decide {
        approved: bool,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    History {
        reply: oneshot::Sender<Vec<HistoryEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle for driving a spawned orchestrator.
///
/// Every method fails with [`RunError::RuntimeClosed`] once the actor stopped.
#[derive(Clone)]
pub struct TaskOrchestrator {
    commands: mpsc::Sender<OrchestratorCommand>,
}

impl TaskOrchestrator {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> OrchestratorCommand,
    ) -> Result<T, RunError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RunError::RuntimeClosed)?;
        rx.await.map_err(|_| RunError::RuntimeClosed)
    }

    /// Start a new session. A live session is superseded.
    ///
    /// Blank inputs fail with [`RunError::InvalidInput`] before any request is
    /// sent.
    pub async fn submit(
        &self,
        command_text: impl Into<String>,
        target_repo: impl Into<String>,
    ) -> Result<SessionHandle, RunError> {
        let command_text = command_text.into();
        let target_repo = target_repo.into();
        self.request(|reply| OrchestratorCommand::Submit {
            command_text,
            target_repo,
            reply,
        })
        .await?
    }

    /// Cancel the live session. Returns `false` when there is nothing to
    /// cancel or a cancel is already in flight.
    pub async fn cancel(&self) -> Result<bool, RunError> {
        self.request(|reply| OrchestratorCommand::Cancel { reply })
            .await
    }

    /// Rewrite the pending approval's action before deciding.
    pub async fn edit_action(&self, text: impl Into<String>) -> Result<bool, RunError> {
        let text = text.into();
        self.request(|reply| OrchestratorCommand::EditAction { text, reply })
            .await
    }

    pub async fn reset_edit(&self) -> Result<bool, RunError> {
        self.request(|reply| OrchestratorCommand::ResetEdit { reply })
            .await
    }

    /// Approve or reject the pending approval. Returns `false` when nothing
    /// undecided is pending.
    pub async fn decide(&self, approved: bool) -> Result<bool, RunError> {
        self.request(|reply| OrchestratorCommand::Decide { approved, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, RunError> {
        self.request(|reply| OrchestratorCommand::Snapshot { reply })
            .await
    }

    pub async fn elapsed_seconds(&self) -> Result<u64, RunError> {
        Ok(self.snapshot().await?.elapsed_seconds)
    }

    /// History entries, newest first.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, RunError> {
        self.request(|reply| OrchestratorCommand::History { reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), RunError> {
        self.request(|reply| OrchestratorCommand::Shutdown { reply })
            .await
    }
}

enum NotifyDone {
    Decision {
        session_id: String,
        ticket: u64,
        task_id: String,
        result: Result<(), RunError>,
    },
    Cancel {
        session_id: String,
        result: Result<(), RunError>,
    },
}

/// Spawn the orchestrator actor.
///
/// Must be called from inside a tokio runtime.
pub fn spawn_orchestrator(
    remote: Arc<dyn RemoteCollaborator>,
    config: &Config,
) -> Result<(TaskOrchestrator, RuntimeEventStream), ConfigError> {
    let detector =
        ApprovalDetector::new(&config.approval.marker, config.approval.scan_window_bytes)
            .map_err(|e| ConfigError::Invalid(format!("approval.marker: {e}")))?;
    let idle_secs = config.network.stream_idle_timeout_secs;
    let tick = Duration::from_millis(config.display.timer_tick_ms.max(1));

    let (command_tx, mut command_rx) = mpsc::channel::<OrchestratorCommand>(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RuntimeEventEnvelope>();
    let (reader_tx, mut reader_rx) = mpsc::unbounded_channel::<ReaderUpdate>();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<NotifyDone>();

    let mut actor = OrchestratorActor {
        remote,
        idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        classifier: OutcomeClassifier::new(&config.history),
        detector,
        gate: ApprovalGate::new(),
        cancel: CancellationController::new(),
        timer: ExecutionTimer::new(),
        ledger: HistoryLedger::new(),
        session: None,
        reader: None,
        event_tx,
        seq: 0,
        reader_tx,
        notify_tx,
    };

    tokio::spawn(async move {
        actor.emit(RuntimeEvent::Lifecycle(LifecycleEvent::RuntimeStarted));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    if actor.handle_command(command) {
                        break;
                    }
                }
                Some(update) = reader_rx.recv() => actor.on_reader_update(update),
                Some(done) = notify_rx.recv() => actor.on_notify_done(done),
                _ = ticker.tick(), if actor.timer.is_running() => actor.emit_tick(),
            }
        }
        actor.stop();
    });

    Ok((
        TaskOrchestrator {
            commands: command_tx,
        },
        event_rx,
    ))
}

struct OrchestratorActor {
    remote: Arc<dyn RemoteCollaborator>,
    idle_timeout: Option<Duration>,
    classifier: OutcomeClassifier,
    detector: ApprovalDetector,
    gate: ApprovalGate,
    cancel: CancellationController,
    timer: ExecutionTimer,
    ledger: HistoryLedger,
    session: Option<ExecutionSession>,
    reader: Option<JoinHandle<()>>,
    event_tx: mpsc::UnboundedSender<RuntimeEventEnvelope>,
    seq: u64,
    reader_tx: mpsc::UnboundedSender<ReaderUpdate>,
    notify_tx: mpsc::UnboundedSender<NotifyDone>,
}

impl OrchestratorActor {
    /// Returns `true` when the actor should stop.
    fn handle_command(&mut self, command: OrchestratorCommand) -> bool {
        match command {
            OrchestratorCommand::Submit {
                command_text,
                target_repo,
                reply,
            } => {
                let _ = reply.send(self.submit(&command_text, &target_repo));
            }
            OrchestratorCommand::Cancel { reply } => {
                let _ = reply.send(self.cancel());
            }
            OrchestratorCommand::EditAction { text, reply } => {
                let _ = reply.send(self.edit_action(&text));
            }
            OrchestratorCommand::ResetEdit { reply } => {
                let _ = reply.send(self.reset_edit());
            }
            OrchestratorCommand::Decide { approved, reply } => {
                let _ = reply.send(self.decide(approved));
            }
            OrchestratorCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            OrchestratorCommand::History { reply } => {
                let _ = reply.send(self.ledger.entries());
            }
            OrchestratorCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn submit(&mut self, command_text: &str, target_repo: &str) -> Result<SessionHandle, RunError> {
        let session = ExecutionSession::open(command_text, target_repo)?;
        if self.live_session_id().is_some() {
            self.supersede_active();
        }

        self.gate.clear();
        self.detector.reset();
        self.timer.start();
        let token = self.cancel.open();

        let handle = session.handle();
        let request = session.run_request();
        info!(
            session_id = %handle.session_id,
            repo = %request.repo_name,
            "submitting automation run"
        );
        self.session = Some(session);
        self.emit(RuntimeEvent::Session(SessionEvent::Submitted {
            session_id: handle.session_id.clone(),
            command_text: request.user_input.clone(),
            target_repo: request.repo_name.clone(),
        }));
        self.emit(RuntimeEvent::Session(SessionEvent::StateChanged {
            session_id: handle.session_id.clone(),
            state: SessionState::Submitting,
        }));

        self.reader = Some(spawn_stream_reader(
            Arc::clone(&self.remote),
            handle.session_id.clone(),
            request,
            token,
            self.idle_timeout,
            self.reader_tx.clone(),
        ));
        Ok(handle)
    }

    /// End the live session locally so a new one can start. The server is
    /// not asked to cancel.
    fn supersede_active(&mut self) {
        self.cancel.abort_silently();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(session) = self.session.as_mut() {
            session.request_cancel();
        }
        if let Some(session_id) = self.live_session_id() {
            info!(session_id = %session_id, "superseded by a new submission");
        }
        self.terminate(Err(RunError::CancelledByOperator));
    }

    fn on_reader_update(&mut self, update: ReaderUpdate) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.id() != update.session_id || !session.state().is_live() {
            debug!(session_id = %update.session_id, "dropping stale reader message");
            return;
        }

        match update.message {
            ReaderMessage::Opened { generated_output } => {
                session.set_generated_output(generated_output);
                let generated_output = session.generated_output().to_string();
                self.emit(RuntimeEvent::Session(SessionEvent::Opened {
                    session_id: update.session_id,
                    generated_output,
                }));
                self.set_state(SessionState::Streaming);
            }
            ReaderMessage::Fragment(fragment) => self.apply_fragment(update.session_id, fragment),
            ReaderMessage::Finished => {
                if self.cancel.is_in_flight() {
                    debug!(session_id = %update.session_id, "stream ended while cancelling");
                    return;
                }
                self.terminate(Ok(()));
            }
            ReaderMessage::Failed(err) => {
                if self.cancel.is_in_flight() {
                    debug!(session_id = %update.session_id, error = %err, "stream failed while cancelling");
                    return;
                }
                warn!(session_id = %update.session_id, error = %err, "automation run failed");
                self.emit(RuntimeEvent::Error(ErrorEvent {
                    session_id: Some(update.session_id),
                    message: err.detail(),
                }));
                self.terminate(Err(err));
            }
            ReaderMessage::Aborted => {
                debug!(session_id = %update.session_id, "stream reader stopped");
            }
        }
    }

    /// Append, scan and publish one fragment as a single step.
    fn apply_fragment(&mut self, session_id: String, fragment: String) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(buffer_len) = session.append(&fragment) else {
            return;
        };
        let hit = if self.cancel.is_in_flight() {
            None
        } else {
            self.detector.scan(&fragment)
        };

        self.emit(RuntimeEvent::Session(SessionEvent::Output {
            session_id: session_id.clone(),
            fragment,
            buffer_len,
        }));
        if let Some(request) = hit {
            self.raise_approval(session_id, request);
        }
    }

    fn raise_approval(&mut self, session_id: String, request: ApprovalRequest) {
        let raised = self.gate.raise(request).clone();
        info!(
            session_id = %session_id,
            task_id = %raised.task_id,
            action = %single_line_preview(&raised.proposed_action, 80),
            "approval requested"
        );
        self.emit(RuntimeEvent::Approval(ApprovalEvent::Raised {
            session_id,
            request: raised,
        }));
        self.set_state(SessionState::AwaitingApproval);
    }

    fn edit_action(&mut self, text: &str) -> bool {
        let Some(session_id) = self.live_session_id() else {
            return false;
        };
        if !self.gate.edit(text) {
            return false;
        }
        self.emit_edited(session_id);
        true
    }

    fn reset_edit(&mut self) -> bool {
        let Some(session_id) = self.live_session_id() else {
            return false;
        };
        if !self.gate.reset_edit() {
            return false;
        }
        self.emit_edited(session_id);
        true
    }

    fn emit_edited(&mut self, session_id: String) {
        let Some(request) = self.gate.pending() else {
            return;
        };
        let event = ApprovalEvent::Edited {
            session_id,
            task_id: request.task_id.clone(),
            edited_action: request.edited_action.clone(),
        };
        self.emit(RuntimeEvent::Approval(event));
    }

    fn decide(&mut self, approved: bool) -> bool {
        let Some(session_id) = self.live_session_id() else {
            return false;
        };
        let Some(dispatch) = self.gate.decide(approved) else {
            return false;
        };
        self.detector.settle(&dispatch.payload.task_id);

        self.emit(RuntimeEvent::Approval(ApprovalEvent::Decided {
            session_id: session_id.clone(),
            task_id: dispatch.payload.task_id.clone(),
            approved,
            edited_command: dispatch.payload.edited_command.clone(),
        }));
        self.set_state(SessionState::Streaming);

        let remote = Arc::clone(&self.remote);
        let done_tx = self.notify_tx.clone();
        tokio::spawn(async move {
            let result = deliver_decision(remote.as_ref(), &dispatch).await;
            let _ = done_tx.send(NotifyDone::Decision {
                session_id,
                ticket: dispatch.ticket,
                task_id: dispatch.payload.task_id,
                result,
            });
        });
        true
    }

    fn cancel(&mut self) -> bool {
        let Some(session_id) = self.live_session_id() else {
            return false;
        };
        if !self.cancel.begin() {
            return false;
        }
        let elapsed_seconds = self.timer.freeze();
        if let Some(session) = self.session.as_mut() {
            session.request_cancel();
        }
        info!(session_id = %session_id, elapsed_seconds, "cancelling automation run");
        self.emit(RuntimeEvent::Session(SessionEvent::Cancelling {
            session_id: session_id.clone(),
        }));

        self.clear_gate(&session_id, ApprovalClearReason::Cancelled);
        self.detector.reset();
        if self.session_state() == Some(SessionState::AwaitingApproval) {
            self.set_state(SessionState::Streaming);
        }

        let remote = Arc::clone(&self.remote);
        let done_tx = self.notify_tx.clone();
        tokio::spawn(async move {
            let result = remote
                .cancel_run()
                .await
                .map_err(|e| RunError::DecisionDelivery(e.detail()));
            let _ = done_tx.send(NotifyDone::Cancel { session_id, result });
        });
        true
    }

    fn on_notify_done(&mut self, done: NotifyDone) {
        match done {
            NotifyDone::Decision {
                session_id,
                ticket,
                task_id,
                result,
            } => {
                let reason = match result {
                    Ok(()) => ApprovalClearReason::Delivered,
                    Err(err) => {
                        self.emit(RuntimeEvent::Warning(WarningEvent {
                            session_id: Some(session_id.clone()),
                            message: err.to_string(),
                        }));
                        ApprovalClearReason::DeliveryFailed
                    }
                };
                if self.current_session_id() == Some(session_id.as_str())
                    && self.gate.complete(ticket)
                {
                    self.emit(RuntimeEvent::Approval(ApprovalEvent::Cleared {
                        session_id,
                        task_id,
                        reason,
                    }));
                }
            }
            NotifyDone::Cancel { session_id, result } => {
                if let Err(err) = result {
                    warn!(session_id = %session_id, error = %err, "cancel notification failed");
                    self.emit(RuntimeEvent::Warning(WarningEvent {
                        session_id: Some(session_id.clone()),
                        message: err.to_string(),
                    }));
                }
                if self.current_session_id() == Some(session_id.as_str()) {
                    self.terminate(Err(RunError::CancelledByOperator));
                }
            }
        }
    }

    /// Move the live session to its terminal state and record it.
    ///
    /// `CancelledByOperator` ends the session as cancelled; any other error
    /// ends it as errored with the error's detail in the status line.
    fn terminate(&mut self, end: Result<(), RunError>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.state().is_live() {
            return;
        }

        let duration_seconds = self.timer.freeze();
        let (outcome, label, status) = match end {
            Ok(()) => {
                let label = self.classifier.classify(session.buffer()).to_string();
                let status = format!("Completed {label}");
                (ResultStatus::Completed, label, status)
            }
            Err(RunError::CancelledByOperator) => (
                ResultStatus::Cancelled,
                CANCELLED_LABEL.to_string(),
                CANCELLED_LABEL.to_string(),
            ),
            Err(err) => (
                ResultStatus::Errored,
                ERRORED_LABEL.to_string(),
                format!("{ERRORED_LABEL}: {}", err.detail()),
            ),
        };
        let state = outcome.session_state();
        session.finish(state, status.clone());
        let session_id = session.id().to_string();

        self.cancel.finish();
        self.reader = None;
        self.detector.reset();
        self.clear_gate(&session_id, ApprovalClearReason::SessionEnded);

        let entry = HistoryEntry {
            task_id: session_id.clone(),
            outcome_label: label,
            result_status: outcome,
            recorded_at_unix_ms: now_unix_millis(),
            duration_seconds,
        };
        self.ledger.record(entry.clone());
        info!(
            session_id = %session_id,
            outcome = outcome.as_str(),
            duration_seconds,
            "session finished"
        );
        self.emit(RuntimeEvent::Session(SessionEvent::Finished {
            session_id,
            state,
            status,
            duration_seconds,
        }));
        self.emit(RuntimeEvent::History(HistoryEvent::Recorded { entry }));
    }

    fn clear_gate(&mut self, session_id: &str, reason: ApprovalClearReason) {
        if let Some(request) = self.gate.clear() {
            self.emit(RuntimeEvent::Approval(ApprovalEvent::Cleared {
                session_id: session_id.to_string(),
                task_id: request.task_id,
                reason,
            }));
        }
    }

    fn set_state(&mut self, next: SessionState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.transition(next) {
            let session_id = session.id().to_string();
            self.emit(RuntimeEvent::Session(SessionEvent::StateChanged {
                session_id,
                state: next,
            }));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(session) => session.snapshot(
                self.timer.elapsed_seconds(),
                self.gate.pending().cloned(),
                self.cancel.is_in_flight(),
            ),
            None => SessionSnapshot::idle(),
        }
    }

    fn emit_tick(&mut self) {
        let Some(session_id) = self.live_session_id() else {
            return;
        };
        let elapsed_seconds = self.timer.elapsed_seconds();
        self.emit(RuntimeEvent::Timer(TimerEvent::Tick {
            session_id,
            elapsed_seconds,
        }));
    }

    fn stop(&mut self) {
        self.cancel.abort_silently();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.emit(RuntimeEvent::Lifecycle(LifecycleEvent::RuntimeStopped));
    }

    fn current_session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.id())
    }

    fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|session| session.state())
    }

    fn live_session_id(&self) -> Option<String> {
        self.session
            .as_ref()
            .filter(|session| session.state().is_live())
            .map(|session| session.id().to_string())
    }

    fn emit(&mut self, event: RuntimeEvent) {
        emit_event(&self.event_tx, &mut self.seq, event);
    }
}

fn emit_event(
    tx: &mpsc::UnboundedSender<RuntimeEventEnvelope>,
    seq: &mut u64,
    event: RuntimeEvent,
) {
    let _ = tx.send(RuntimeEventEnvelope::new(*seq, event));
    *seq = seq.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DecisionPayload;
    use crate::error::ApiError;
    use crate::testsupport::ScriptedCollaborator;
    use tokio::time::timeout;

    async fn recv_envelope(events: &mut RuntimeEventStream) -> RuntimeEventEnvelope {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for runtime event")
            .expect("runtime event channel closed")
    }

    async fn wait_for(
        events: &mut RuntimeEventStream,
        pred: impl Fn(&RuntimeEvent) -> bool,
    ) -> RuntimeEvent {
        loop {
            let event = recv_envelope(events).await.event;
            if pred(&event) {
                return event;
            }
        }
    }

    async fn wait_opened(events: &mut RuntimeEventStream) {
        wait_for(events, |e| {
            matches!(e, RuntimeEvent::Session(SessionEvent::Opened { .. }))
        })
        .await;
    }

    async fn wait_finished(events: &mut RuntimeEventStream) -> (SessionState, String) {
        match wait_for(events, |e| {
            matches!(e, RuntimeEvent::Session(SessionEvent::Finished { .. }))
        })
        .await
        {
            RuntimeEvent::Session(SessionEvent::Finished { state, status, .. }) => (state, status),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    fn spawn_with(
        remote: &Arc<ScriptedCollaborator>,
    ) -> (TaskOrchestrator, RuntimeEventStream) {
        spawn_orchestrator(remote.clone(), &Config::default()).expect("spawn orchestrator")
    }

    #[tokio::test]
    async fn completed_session_is_classified_and_recorded() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(Some("plan: add workflow"));
        let (orchestrator, mut events) = spawn_with(&remote);
        assert!(matches!(
            recv_envelope(&mut events).await.event,
            RuntimeEvent::Lifecycle(LifecycleEvent::RuntimeStarted)
        ));

        orchestrator
            .submit("create pipeline", "org/repo")
            .await
            .expect("submit");
        wait_opened(&mut events).await;
        for fragment in ["Building", " GitHub Actions", " workflow"] {
            script.send_text(fragment);
        }
        script.finish();

        let (state, status) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Completed);
        assert_eq!(status, "Completed Creation of GitHub Actions pipeline");

        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.buffer, "Building GitHub Actions workflow");
        assert_eq!(snapshot.generated_output, "plan: add workflow");
        assert_eq!(snapshot.state, SessionState::Completed);

        let history = orchestrator.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result_status, ResultStatus::Completed);
        assert_eq!(history[0].outcome_label, "Creation of GitHub Actions pipeline");
        assert_eq!(history[0].task_id, snapshot.session_id.unwrap_or_default());

        assert_eq!(
            remote.requests(),
            vec![crate::api::RunRequest {
                user_input: "create pipeline".into(),
                repo_name: "org/repo".into(),
            }]
        );
    }

    #[tokio::test]
    async fn event_sequence_numbers_are_monotonic() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("x", "y").await.expect("submit");
        script.send_text("a");
        script.finish();

        let mut last = None;
        loop {
            let envelope = recv_envelope(&mut events).await;
            if let Some(prev) = last {
                assert_eq!(envelope.seq, prev + 1);
            }
            last = Some(envelope.seq);
            if matches!(envelope.event, RuntimeEvent::History(_)) {
                break;
            }
        }
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_network_call() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let (orchestrator, _events) = spawn_with(&remote);
        let err = orchestrator
            .submit("   ", "org/repo")
            .await
            .expect_err("blank command");
        assert!(matches!(err, RunError::InvalidInput(_)));
        assert!(matches!(
            orchestrator.submit("deploy", "").await,
            Err(RunError::InvalidInput(_))
        ));
        assert!(remote.requests().is_empty());
        assert_eq!(
            orchestrator.snapshot().await.expect("snapshot").state,
            SessionState::Idle
        );
    }

    #[tokio::test]
    async fn rejected_approval_is_delivered_and_stream_continues() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("clean up", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        script.send_text("[ApprovalRequired] t9 → delete bucket");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
        })
        .await;
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.state, SessionState::AwaitingApproval);
        let pending = snapshot.pending_approval.expect("pending approval");
        assert_eq!(pending.task_id, "t9");
        assert_eq!(pending.proposed_action, "delete bucket");

        assert!(orchestrator.decide(false).await.expect("decide"));
        let cleared = wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Cleared { .. }))
        })
        .await;
        assert!(matches!(
            cleared,
            RuntimeEvent::Approval(ApprovalEvent::Cleared {
                reason: ApprovalClearReason::Delivered,
                ..
            })
        ));
        assert_eq!(
            remote.decisions(),
            vec![DecisionPayload {
                task_id: "t9".into(),
                approved: false,
                edited_command: "delete bucket".into(),
            }]
        );

        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert!(snapshot.pending_approval.is_none());
        assert_eq!(snapshot.state, SessionState::Streaming);

        script.send_text("\nskipped deletion");
        script.finish();
        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Completed);
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert_eq!(
            snapshot.buffer,
            "[ApprovalRequired] t9 → delete bucket\nskipped deletion"
        );
    }

    #[tokio::test]
    async fn edited_action_is_sent_on_approval() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        assert!(!orchestrator.edit_action("nothing pending").await.expect("edit"));
        script.send_text("[ApprovalRequired] task-42 -> run: terraform apply\n");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
        })
        .await;
        assert!(orchestrator
            .edit_action("run: terraform plan")
            .await
            .expect("edit"));
        assert!(orchestrator.decide(true).await.expect("decide"));
        assert!(!orchestrator.decide(true).await.expect("second decide"));
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Cleared { .. }))
        })
        .await;

        assert_eq!(
            remote.decisions(),
            vec![DecisionPayload {
                task_id: "task-42".into(),
                approved: true,
                edited_command: "run: terraform plan".into(),
            }]
        );
    }

    #[tokio::test]
    async fn decided_checkpoint_is_not_raised_again_as_its_line_grows() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("clean up", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        script.send_text("\n[ApprovalRequired] t9 → delete");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
        })
        .await;
        assert!(orchestrator.decide(true).await.expect("decide"));
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Cleared { .. }))
        })
        .await;
        script.send_text(" bucket");
        script.send_text("\ndone");
        script.finish();

        let mut raised_again = 0;
        loop {
            match recv_envelope(&mut events).await.event {
                RuntimeEvent::Approval(ApprovalEvent::Raised { .. }) => raised_again += 1,
                RuntimeEvent::Session(SessionEvent::Finished { state, .. }) => {
                    assert_eq!(state, SessionState::Completed);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(raised_again, 0);
        assert!(!orchestrator.decide(false).await.expect("second decide"));
        assert_eq!(
            remote.decisions(),
            vec![DecisionPayload {
                task_id: "t9".into(),
                approved: true,
                edited_command: "delete".into(),
            }]
        );
    }

    #[tokio::test]
    async fn failed_decision_delivery_warns_and_still_clears() {
        let remote = Arc::new(ScriptedCollaborator::new());
        remote.fail_notifications();
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;
        script.send_text("[ApprovalRequired] t1 → restart service\n");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
        })
        .await;

        orchestrator.decide(true).await.expect("decide");
        wait_for(&mut events, |e| matches!(e, RuntimeEvent::Warning(_))).await;
        let cleared = wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Cleared { .. }))
        })
        .await;
        assert!(matches!(
            cleared,
            RuntimeEvent::Approval(ApprovalEvent::Cleared {
                reason: ApprovalClearReason::DeliveryFailed,
                ..
            })
        ));
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert!(snapshot.state.is_live(), "delivery failure is not fatal");
        assert!(snapshot.pending_approval.is_none());
    }

    #[tokio::test]
    async fn cancel_while_streaming_clears_approval_without_notification() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;
        script.send_text("step 1\n[ApprovalRequired] t9 → delete bucket\n");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
        })
        .await;

        assert!(orchestrator.cancel().await.expect("cancel"));
        let cleared = wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Approval(ApprovalEvent::Cleared { .. }))
        })
        .await;
        assert!(matches!(
            cleared,
            RuntimeEvent::Approval(ApprovalEvent::Cleared {
                reason: ApprovalClearReason::Cancelled,
                ..
            })
        ));
        let (state, status) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
        assert_eq!(status, "Execution cancelled");

        assert_eq!(remote.cancel_calls(), 1);
        assert!(remote.decisions().is_empty());
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert!(snapshot.cancel_requested);
        assert!(snapshot.pending_approval.is_none());
        assert_eq!(snapshot.buffer, "step 1\n[ApprovalRequired] t9 → delete bucket\n");

        let history = orchestrator.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result_status, ResultStatus::Cancelled);
        assert_eq!(history[0].outcome_label, CANCELLED_LABEL);
    }

    #[tokio::test]
    async fn double_cancel_records_one_entry() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let _script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        let (first, second) = tokio::join!(orchestrator.cancel(), orchestrator.cancel());
        assert!(first.expect("first") ^ second.expect("second"));
        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
        assert!(!orchestrator.cancel().await.expect("cancel after terminal"));

        assert_eq!(remote.cancel_calls(), 1);
        assert_eq!(orchestrator.history().await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn stream_end_during_cancel_is_ignored() {
        let remote = Arc::new(ScriptedCollaborator::new());
        remote.delay_cancel(Duration::from_millis(200));
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        assert!(orchestrator.cancel().await.expect("cancel"));
        script.finish();
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert!(snapshot.state.is_live());
        assert!(snapshot.cancel_in_flight);
        assert_eq!(snapshot.view().cancel_label, CANCEL_BUSY_LABEL);

        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
        let history = orchestrator.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result_status, ResultStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_clock_before_notification_returns() {
        let remote = Arc::new(ScriptedCollaborator::new());
        remote.delay_cancel(Duration::from_secs(8));
        let _script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(orchestrator.cancel().await.expect("cancel"));
        assert_eq!(orchestrator.elapsed_seconds().await.expect("elapsed"), 2);

        tokio::time::sleep(Duration::from_secs(4)).await;
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert!(snapshot.cancel_in_flight);
        assert_eq!(snapshot.elapsed_seconds, 2);

        // Past the notification delay, so Finished is already queued.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
        let history = orchestrator.history().await.expect("history");
        assert_eq!(history[0].duration_seconds, 2);
    }

    #[tokio::test]
    async fn cancel_notification_failure_still_cancels() {
        let remote = Arc::new(ScriptedCollaborator::new());
        remote.fail_notifications();
        let _script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        orchestrator.cancel().await.expect("cancel");
        let warning = wait_for(&mut events, |e| matches!(e, RuntimeEvent::Warning(_))).await;
        match warning {
            RuntimeEvent::Warning(w) => {
                assert!(w.message.contains("automation service unavailable"), "{}", w.message)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
    }

    #[tokio::test]
    async fn refused_run_errors_with_server_detail() {
        let remote = Arc::new(ScriptedCollaborator::new());
        remote.push_run_error(ApiError::Status {
            code: 400,
            body: r#"{"detail":"User input and repo name are required"}"#.into(),
        });
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");

        let (state, status) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Errored);
        assert_eq!(
            status,
            "Error occurred during execution: server returned status 400: User input and repo name are required"
        );
        let history = orchestrator.history().await.expect("history");
        assert_eq!(history[0].result_status, ResultStatus::Errored);
        assert_eq!(history[0].outcome_label, ERRORED_LABEL);
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_buffer() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;
        script.send_text("partial output");
        script.fail(ApiError::InvalidResponse("connection reset".into()));

        let (state, status) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Errored);
        assert!(status.contains("connection reset"), "{status}");
        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.buffer, "partial output");
    }

    #[tokio::test]
    async fn resubmission_supersedes_live_session() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let first = remote.push_run(None);
        let second = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);

        let old = orchestrator.submit("first", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;
        first.send_text("old output");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Session(SessionEvent::Output { .. }))
        })
        .await;

        let new = orchestrator.submit("second", "org/repo").await.expect("resubmit");
        assert_ne!(old.session_id, new.session_id);
        let (state, status) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Cancelled);
        assert_eq!(status, CANCELLED_LABEL);

        wait_opened(&mut events).await;
        first.send_text(" late");
        second.send_text("new output");
        second.finish();
        let (state, _) = wait_finished(&mut events).await;
        assert_eq!(state, SessionState::Completed);

        let snapshot = orchestrator.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.buffer, "new output");
        assert_eq!(remote.cancel_calls(), 0);
        let history = orchestrator.history().await.expect("history");
        let ids: Vec<&str> = history.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec![new.session_id.as_str(), old.session_id.as_str()]);
        assert_eq!(history[1].result_status, ResultStatus::Cancelled);
    }

    #[tokio::test]
    async fn second_marker_replaces_pending_approval() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let script = remote.push_run(None);
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.submit("deploy", "org/repo").await.expect("submit");
        wait_opened(&mut events).await;

        script.send_text("[ApprovalRequired] t1 → first action\n");
        script.send_text("[ApprovalRequired] t2 → second action\n");
        for _ in 0..2 {
            wait_for(&mut events, |e| {
                matches!(e, RuntimeEvent::Approval(ApprovalEvent::Raised { .. }))
            })
            .await;
        }
        let pending = orchestrator
            .snapshot()
            .await
            .expect("snapshot")
            .pending_approval
            .expect("pending");
        assert_eq!(pending.task_id, "t2");
        assert!(remote.decisions().is_empty());
    }

    #[tokio::test]
    async fn live_session_publishes_timer_ticks() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let _script = remote.push_run(None);
        let mut config = Config::default();
        config.display.timer_tick_ms = 20;
        let (orchestrator, mut events) =
            spawn_orchestrator(remote.clone(), &config).expect("spawn");
        let handle = orchestrator.submit("deploy", "org/repo").await.expect("submit");

        match wait_for(&mut events, |e| matches!(e, RuntimeEvent::Timer(_))).await {
            RuntimeEvent::Timer(TimerEvent::Tick { session_id, .. }) => {
                assert_eq!(session_id, handle.session_id)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(orchestrator.elapsed_seconds().await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_stops_actor() {
        let remote = Arc::new(ScriptedCollaborator::new());
        let (orchestrator, mut events) = spawn_with(&remote);
        orchestrator.shutdown().await.expect("shutdown");
        wait_for(&mut events, |e| {
            matches!(e, RuntimeEvent::Lifecycle(LifecycleEvent::RuntimeStopped))
        })
        .await;
        assert_eq!(
            orchestrator.snapshot().await.expect_err("closed"),
            RunError::RuntimeClosed
        );
    }
}
