//! Presentation projection derived from a [`SessionSnapshot`].
//!
//! Every control label and enablement flag is computed from the single session
//! state, so frontends never keep their own booleans in sync.

use serde::Serialize;

use super::session::{SessionSnapshot, SessionState};
use crate::approval::ApprovalDecision;

pub const SUBMIT_LABEL: &str = "Execute";
pub const SUBMIT_BUSY_LABEL: &str = "Processing...";
pub const CANCEL_LABEL: &str = "Cancel";
pub const CANCEL_BUSY_LABEL: &str = "Cancelling...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub submit_enabled: bool,
    pub submit_label: &'static str,
    pub cancel_enabled: bool,
    pub cancel_label: &'static str,
    pub timer_line: Option<String>,
    pub status_line: Option<String>,
    /// Present while an undecided approval is waiting on the operator.
    pub approval_prompt: Option<String>,
}

impl SessionSnapshot {
    pub fn view(&self) -> SessionView {
        let live = self.state.is_live();
        let timer_line = if live {
            Some(format!("Execution Time: {} seconds", self.elapsed_seconds))
        } else if self.state.is_terminal() {
            Some(format!(
                "Total Execution Time: {} seconds",
                self.elapsed_seconds
            ))
        } else {
            None
        };
        let approval_prompt = self
            .pending_approval
            .as_ref()
            .filter(|request| {
                self.state == SessionState::AwaitingApproval
                    && request.decision == ApprovalDecision::Pending
            })
            .map(|request| {
                format!(
                    "Approval required for {}: {}",
                    request.task_id, request.edited_action
                )
            });

        SessionView {
            submit_enabled: !live,
            submit_label: if live { SUBMIT_BUSY_LABEL } else { SUBMIT_LABEL },
            cancel_enabled: live && !self.cancel_in_flight,
            cancel_label: if self.cancel_in_flight {
                CANCEL_BUSY_LABEL
            } else {
                CANCEL_LABEL
            },
            timer_line,
            status_line: self.status.clone(),
            approval_prompt,
        }
    }
}
