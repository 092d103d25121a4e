//! CLI runtime-event renderer adapter.
//!
//! Translates typed runtime events and snapshots into terminal output through
//! a [`RenderSink`], keeping `main.rs` focused on input handling.

use runstream::render::RenderSink;
use runstream::runtime::{
    ApprovalClearReason, ApprovalEvent, HistoryEntry, RuntimeEvent, SessionEvent, SessionSnapshot,
    SessionState, NO_GENERATED_OUTPUT,
};
use runstream::textutil::{last_nonempty_line, single_line_preview};

use crate::cli::REPL_HELP;

const PREVIEW_CHARS: usize = 96;

/// Render one runtime event. Returns the terminal state when a session
/// finished.
pub(crate) fn render_runtime_event(
    renderer: &dyn RenderSink,
    event: &RuntimeEvent,
) -> Option<SessionState> {
    match event {
        RuntimeEvent::Lifecycle(_) | RuntimeEvent::Timer(_) | RuntimeEvent::History(_) => {}
        RuntimeEvent::Warning(event) => renderer.warn(&event.message),
        RuntimeEvent::Error(event) => renderer.error(&event.message),
        RuntimeEvent::Session(event) => match event {
            SessionEvent::Submitted {
                command_text,
                target_repo,
                ..
            } => renderer.activity(&format!(
                "Processing... [{target_repo}] {}",
                single_line_preview(command_text, PREVIEW_CHARS)
            )),
            SessionEvent::Opened {
                generated_output, ..
            } => {
                if generated_output != NO_GENERATED_OUTPUT {
                    renderer.field(
                        "generated",
                        &single_line_preview(generated_output, PREVIEW_CHARS),
                    );
                }
            }
            SessionEvent::Output { fragment, .. } => renderer.output(fragment),
            SessionEvent::StateChanged { .. } => {}
            SessionEvent::Cancelling { .. } => renderer.activity("Cancelling..."),
            SessionEvent::Finished {
                state,
                status,
                duration_seconds,
                ..
            } => {
                match state {
                    SessionState::Errored => renderer.error(status),
                    _ => renderer.section(status),
                }
                renderer.field(
                    "Total Execution Time",
                    &format!("{duration_seconds} seconds"),
                );
                return Some(*state);
            }
        },
        RuntimeEvent::Approval(event) => match event {
            ApprovalEvent::Raised { request, .. } => {
                renderer.approval(&format!(
                    "{} → {}",
                    request.task_id, request.proposed_action
                ));
                renderer.field("respond with", "/approve, /reject or /edit <text>");
            }
            ApprovalEvent::Edited { edited_action, .. } => {
                renderer.field("edited action", edited_action);
            }
            ApprovalEvent::Decided {
                task_id, approved, ..
            } => {
                let verb = if *approved { "approved" } else { "rejected" };
                renderer.activity(&format!("{verb} {task_id}"));
            }
            ApprovalEvent::Cleared {
                task_id, reason, ..
            } => match reason {
                ApprovalClearReason::Delivered | ApprovalClearReason::DeliveryFailed => {}
                ApprovalClearReason::Cancelled | ApprovalClearReason::SessionEnded => {
                    renderer.activity(&format!("approval for {task_id} discarded"));
                }
            },
        },
    }
    None
}

/// Render the `/status` view of a snapshot.
pub(crate) fn render_status(renderer: &dyn RenderSink, snapshot: &SessionSnapshot) {
    let view = snapshot.view();
    renderer.section("status");
    renderer.field("state", snapshot.state.as_str());
    if snapshot.session_id.is_none() {
        return;
    }
    renderer.field("repo", &snapshot.target_repo);
    renderer.field(
        "request",
        &single_line_preview(&snapshot.command_text, PREVIEW_CHARS),
    );
    if let Some(timer) = &view.timer_line {
        renderer.field("timer", timer);
    }
    if let Some(status) = &view.status_line {
        renderer.field("status", status);
    }
    if let Some(line) = last_nonempty_line(&snapshot.buffer) {
        renderer.field("last output", &single_line_preview(line, PREVIEW_CHARS));
    }
    if let Some(prompt) = &view.approval_prompt {
        renderer.approval(prompt);
    }
    renderer.field(
        "controls",
        &format!("[{}] [{}]", view.submit_label, view.cancel_label),
    );
}

/// Render the `/history` listing, newest first.
pub(crate) fn render_history(renderer: &dyn RenderSink, entries: &[HistoryEntry]) {
    renderer.section("execution history");
    if entries.is_empty() {
        renderer.field("entries", "none");
        return;
    }
    for entry in entries {
        renderer.field(
            &entry.timestamp_display(),
            &format!(
                "{} ({} seconds) [{}]",
                entry.status_line(),
                entry.duration_seconds,
                entry.task_id
            ),
        );
    }
}

pub(crate) fn render_help(renderer: &dyn RenderSink) {
    renderer.section("commands");
    for (usage, description) in REPL_HELP {
        renderer.field(usage, description);
    }
}
