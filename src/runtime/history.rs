//! Terminal-session ledger and outcome labelling.

use std::collections::VecDeque;
use std::time::{Duration, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::session::SessionState;
use crate::config::{HistoryConfig, LabelRule};

/// Outcome label recorded for cancelled sessions.
pub const CANCELLED_LABEL: &str = "Execution cancelled";
/// Outcome label recorded for failed sessions.
pub const ERRORED_LABEL: &str = "Error occurred during execution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Cancelled,
    Errored,
}

impl ResultStatus {
    /// Terminal session state matching this outcome.
    pub fn session_state(self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            Self::Cancelled => SessionState::Cancelled,
            Self::Errored => SessionState::Errored,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}

/// One terminated session. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub outcome_label: String,
    pub result_status: ResultStatus,
    pub recorded_at_unix_ms: u64,
    pub duration_seconds: u64,
}

impl HistoryEntry {
    /// Status column text, e.g. `Completed Creation of GitHub Actions pipeline`.
    pub fn status_line(&self) -> String {
        match self.result_status {
            ResultStatus::Completed => format!("Completed {}", self.outcome_label),
            _ => self.outcome_label.clone(),
        }
    }

    /// RFC 7231 rendering of `recorded_at_unix_ms`.
    pub fn timestamp_display(&self) -> String {
        httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_millis(self.recorded_at_unix_ms))
    }
}

/// Append-only, newest-first.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Ordered first-match keyword classification of a completed buffer.
#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    rules: Vec<LabelRule>,
    fallback: String,
}

impl OutcomeClassifier {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            rules: config.labels.clone(),
            fallback: config.fallback_label.clone(),
        }
    }

    pub fn classify(&self, buffer: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| buffer.contains(rule.keyword.as_str()))
            .map(|rule| rule.label.as_str())
            .unwrap_or(&self.fallback)
    }
}
