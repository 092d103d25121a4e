//! Runtime event schema.
//!
//! Frontends consume these envelopes to render progress without reaching into
//! orchestrator internals.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::history::HistoryEntry;
use super::session::SessionState;
use crate::approval::ApprovalRequest;

/// Monotonic envelope for runtime events.
///
/// `seq` is assigned by the orchestrator; `ts_unix_ms` is wall-clock capture
/// time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeEventEnvelope {
    pub seq: u64,
    pub ts_unix_ms: u64,
    pub event: RuntimeEvent,
}

impl RuntimeEventEnvelope {
    pub fn new(seq: u64, event: RuntimeEvent) -> Self {
        Self {
            seq,
            ts_unix_ms: now_unix_millis(),
            event,
        }
    }
}

/// Typed runtime event families.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum RuntimeEvent {
    Lifecycle(LifecycleEvent),
    Session(SessionEvent),
    Approval(ApprovalEvent),
    Timer(TimerEvent),
    History(HistoryEvent),
    Warning(WarningEvent),
    Error(ErrorEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    RuntimeStarted,
    RuntimeStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Submitted {
        session_id: String,
        command_text: String,
        target_repo: String,
    },
    /// Response headers arrived; the body is about to stream.
    Opened {
        session_id: String,
        generated_output: String,
    },
    Output {
        session_id: String,
        fragment: String,
        buffer_len: usize,
    },
    StateChanged {
        session_id: String,
        state: SessionState,
    },
    Cancelling {
        session_id: String,
    },
    Finished {
        session_id: String,
        state: SessionState,
        status: String,
        duration_seconds: u64,
    },
}

/// Why a pending approval left the gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalClearReason {
    Delivered,
    DeliveryFailed,
    Cancelled,
    SessionEnded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalEvent {
    Raised {
        session_id: String,
        request: ApprovalRequest,
    },
    Edited {
        session_id: String,
        task_id: String,
        edited_action: String,
    },
    Decided {
        session_id: String,
        task_id: String,
        approved: bool,
        edited_command: String,
    },
    Cleared {
        session_id: String,
        task_id: String,
        reason: ApprovalClearReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerEvent {
    Tick {
        session_id: String,
        elapsed_seconds: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Recorded { entry: HistoryEntry },
}

/// Non-fatal warning surfaced to frontends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarningEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub message: String,
}

/// Error surfaced to frontends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub message: String,
}

pub(crate) fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
