//! The single owned execution session and its read-only snapshot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::now_unix_millis;
use crate::api::RunRequest;
use crate::approval::ApprovalRequest;
use crate::error::RunError;
use crate::stream::OutputAggregator;

/// Value recorded when the run response carries no generated-output header.
pub const NO_GENERATED_OUTPUT: &str = "No output from LLM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Submitting,
    Streaming,
    AwaitingApproval,
    Completed,
    Cancelled,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }

    /// A session in this state owns the run and blocks nothing but itself.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::Streaming | Self::AwaitingApproval
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Streaming => "streaming",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub started_at_unix_ms: u64,
}

#[derive(Debug)]
pub(super) struct ExecutionSession {
    session_id: String,
    command_text: String,
    target_repo: String,
    state: SessionState,
    output: OutputAggregator,
    generated_output: String,
    started_at_unix_ms: u64,
    ended_at_unix_ms: Option<u64>,
    cancel_requested: bool,
    status: Option<String>,
}

impl ExecutionSession {
    /// Validate inputs and create a session in `Submitting`.
    pub(super) fn open(command_text: &str, target_repo: &str) -> Result<Self, RunError> {
        if command_text.trim().is_empty() {
            return Err(RunError::InvalidInput("command is empty".to_string()));
        }
        if target_repo.trim().is_empty() {
            return Err(RunError::InvalidInput(
                "target repository is empty".to_string(),
            ));
        }
        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            command_text: command_text.trim().to_string(),
            target_repo: target_repo.trim().to_string(),
            state: SessionState::Submitting,
            output: OutputAggregator::new(),
            generated_output: NO_GENERATED_OUTPUT.to_string(),
            started_at_unix_ms: now_unix_millis(),
            ended_at_unix_ms: None,
            cancel_requested: false,
            status: None,
        })
    }

    pub(super) fn id(&self) -> &str {
        &self.session_id
    }

    pub(super) fn state(&self) -> SessionState {
        self.state
    }

    pub(super) fn buffer(&self) -> &str {
        self.output.snapshot()
    }

    pub(super) fn generated_output(&self) -> &str {
        &self.generated_output
    }

    pub(super) fn run_request(&self) -> RunRequest {
        RunRequest {
            user_input: self.command_text.clone(),
            repo_name: self.target_repo.clone(),
        }
    }

    pub(super) fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.session_id.clone(),
            started_at_unix_ms: self.started_at_unix_ms,
        }
    }

    pub(super) fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub(super) fn set_generated_output(&mut self, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.generated_output = value;
        }
    }

    /// Move between live states. Returns whether the state changed.
    pub(super) fn transition(&mut self, next: SessionState) -> bool {
        if self.state.is_terminal() || self.state == next {
            return false;
        }
        self.state = next;
        true
    }

    /// Append one fragment and return the new buffer length.
    ///
    /// Terminal sessions are frozen and ignore late fragments.
    pub(super) fn append(&mut self, fragment: &str) -> Option<usize> {
        if self.state.is_terminal() {
            return None;
        }
        Some(self.output.append(fragment).len())
    }

    pub(super) fn finish(&mut self, state: SessionState, status: String) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.status = Some(status);
        self.ended_at_unix_ms = Some(now_unix_millis());
    }

    pub(super) fn snapshot(
        &self,
        elapsed_seconds: u64,
        pending_approval: Option<ApprovalRequest>,
        cancel_in_flight: bool,
    ) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(self.session_id.clone()),
            command_text: self.command_text.clone(),
            target_repo: self.target_repo.clone(),
            state: self.state,
            buffer: self.buffer().to_string(),
            generated_output: self.generated_output.clone(),
            status: self.status.clone(),
            started_at_unix_ms: Some(self.started_at_unix_ms),
            ended_at_unix_ms: self.ended_at_unix_ms,
            elapsed_seconds,
            cancel_requested: self.cancel_requested,
            cancel_in_flight,
            pending_approval,
        }
    }
}

/// Point-in-time copy of everything a frontend needs to draw the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub command_text: String,
    pub target_repo: String,
    pub state: SessionState,
    pub buffer: String,
    pub generated_output: String,
    pub status: Option<String>,
    pub started_at_unix_ms: Option<u64>,
    pub ended_at_unix_ms: Option<u64>,
    pub elapsed_seconds: u64,
    pub cancel_requested: bool,
    pub cancel_in_flight: bool,
    pub pending_approval: Option<ApprovalRequest>,
}

impl SessionSnapshot {
    /// Snapshot before anything was submitted.
    pub fn idle() -> Self {
        Self {
            session_id: None,
            command_text: String::new(),
            target_repo: String::new(),
            state: SessionState::Idle,
            buffer: String::new(),
            generated_output: String::new(),
            status: None,
            started_at_unix_ms: None,
            ended_at_unix_ms: None,
            elapsed_seconds: 0,
            cancel_requested: false,
            cancel_in_flight: false,
            pending_approval: None,
        }
    }
}
