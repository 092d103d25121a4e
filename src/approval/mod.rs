//! Approval checkpoints embedded in the output stream.

mod detector;
mod gate;

use serde::{Deserialize, Serialize};

pub use detector::ApprovalDetector;
pub use gate::{deliver_decision, ApprovalGate, DecisionDispatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
}

/// An operator sign-off requested by the remote process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub task_id: String,
    pub proposed_action: String,
    /// Starts equal to `proposed_action`; the operator may rewrite it.
    pub edited_action: String,
    pub decision: ApprovalDecision,
}

impl ApprovalRequest {
    pub fn new(task_id: impl Into<String>, proposed_action: impl Into<String>) -> Self {
        let proposed_action = proposed_action.into();
        Self {
            task_id: task_id.into(),
            edited_action: proposed_action.clone(),
            proposed_action,
            decision: ApprovalDecision::Pending,
        }
    }
}
