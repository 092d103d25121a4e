//! Single-slot holder for the pending approval request.

use tracing::{debug, warn};

use super::{ApprovalDecision, ApprovalRequest};
use crate::api::{DecisionPayload, RemoteCollaborator};
use crate::error::RunError;

/// A decision ready to be delivered, tagged with the gate slot it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionDispatch {
    pub ticket: u64,
    pub payload: DecisionPayload,
}

#[derive(Debug, Default)]
pub struct ApprovalGate {
    pending: Option<(u64, ApprovalRequest)>,
    edit_in_progress: bool,
    next_ticket: u64,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&ApprovalRequest> {
        self.pending.as_ref().map(|(_, request)| request)
    }

    /// Install `request`, replacing any existing one without notifying the
    /// server. An edit in progress carries its text over to the new request.
    pub fn raise(&mut self, mut request: ApprovalRequest) -> &ApprovalRequest {
        if self.edit_in_progress {
            if let Some((_, previous)) = &self.pending {
                request.edited_action = previous.edited_action.clone();
            }
        }
        self.next_ticket += 1;
        let slot = self.pending.insert((self.next_ticket, request));
        &slot.1
    }

    /// Replace the edited action. Returns `false` when nothing is pending or
    /// the request is already decided.
    pub fn edit(&mut self, text: &str) -> bool {
        match &mut self.pending {
            Some((_, request)) if request.decision == ApprovalDecision::Pending => {
                request.edited_action = text.to_string();
                self.edit_in_progress = true;
                true
            }
            _ => false,
        }
    }

    /// Drop the operator's edit and fall back to the proposed action.
    pub fn reset_edit(&mut self) -> bool {
        self.edit_in_progress = false;
        match &mut self.pending {
            Some((_, request)) if request.decision == ApprovalDecision::Pending => {
                request.edited_action = request.proposed_action.clone();
                true
            }
            _ => false,
        }
    }

    /// Record the operator's decision and build the payload to deliver.
    ///
    /// The request stays in the gate, marked decided, until [`complete`] is
    /// called with the returned ticket.
    ///
    /// [`complete`]: ApprovalGate::complete
    pub fn decide(&mut self, approved: bool) -> Option<DecisionDispatch> {
        let (ticket, request) = self.pending.as_mut()?;
        if request.decision != ApprovalDecision::Pending {
            return None;
        }
        request.decision = if approved {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Rejected
        };
        self.edit_in_progress = false;
        Some(DecisionDispatch {
            ticket: *ticket,
            payload: DecisionPayload {
                task_id: request.task_id.clone(),
                approved,
                edited_command: request.edited_action.clone(),
            },
        })
    }

    /// Clear the slot after delivery, unless a newer request replaced it.
    pub fn complete(&mut self, ticket: u64) -> bool {
        if matches!(&self.pending, Some((held, _)) if *held == ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Discard whatever is pending. Never contacts the server.
    pub fn clear(&mut self) -> Option<ApprovalRequest> {
        self.edit_in_progress = false;
        self.pending.take().map(|(_, request)| request)
    }
}

/// POST one decision. Failures are logged and handed back as
/// [`RunError::DecisionDelivery`]; the caller clears the gate either way.
pub async fn deliver_decision(
    remote: &dyn RemoteCollaborator,
    dispatch: &DecisionDispatch,
) -> Result<(), RunError> {
    debug!(
        task_id = %dispatch.payload.task_id,
        approved = dispatch.payload.approved,
        "delivering approval decision"
    );
    remote.send_decision(&dispatch.payload).await.map_err(|e| {
        warn!(task_id = %dispatch.payload.task_id, error = %e, "approval decision not delivered");
        RunError::DecisionDelivery(e.detail())
    })
}
