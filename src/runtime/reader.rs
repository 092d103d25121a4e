//! Background task that consumes one run response.
//!
//! The reader owns no session state: it forwards decoded fragments and the
//! stream outcome to the orchestrator actor, tagged with the session id so
//! messages from a superseded session can be dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::cancel::CancelToken;
use crate::api::{RemoteCollaborator, RunRequest};
use crate::error::{ApiError, RunError};
use crate::stream::fragments;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ReaderMessage {
    Opened { generated_output: Option<String> },
    Fragment(String),
    Finished,
    Failed(RunError),
    /// The cancel token fired; no more messages follow.
    Aborted,
}

#[derive(Debug)]
pub(super) struct ReaderUpdate {
    pub(super) session_id: String,
    pub(super) message: ReaderMessage,
}

pub(super) fn spawn_stream_reader(
    remote: Arc<dyn RemoteCollaborator>,
    session_id: String,
    request: RunRequest,
    mut token: CancelToken,
    idle_timeout: Option<Duration>,
    tx: mpsc::UnboundedSender<ReaderUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = |message: ReaderMessage| {
            let _ = tx.send(ReaderUpdate {
                session_id: session_id.clone(),
                message,
            });
        };

        let started = tokio::select! {
            biased;
            _ = token.cancelled() => {
                send(ReaderMessage::Aborted);
                return;
            }
            result = remote.start_run(&request) => result,
        };
        let run = match started {
            Ok(run) => run,
            Err(err) => {
                send(ReaderMessage::Failed(RunError::from(err)));
                return;
            }
        };
        send(ReaderMessage::Opened {
            generated_output: run.generated_output,
        });

        let mut body = Box::pin(fragments(run.body));
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(session_id = %session_id, "stream read aborted");
                    send(ReaderMessage::Aborted);
                    return;
                }
                next = next_with_idle(&mut body, idle_timeout) => next,
            };
            match next {
                Ok(Some(fragment)) => send(ReaderMessage::Fragment(fragment)),
                Ok(None) => {
                    send(ReaderMessage::Finished);
                    return;
                }
                Err(err) => {
                    send(ReaderMessage::Failed(RunError::from(err)));
                    return;
                }
            }
        }
    })
}

async fn next_with_idle<S>(
    body: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<String>, ApiError>
where
    S: Stream<Item = Result<String, ApiError>> + Unpin,
{
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, body.next()).await {
            Ok(item) => item.transpose(),
            Err(_) => Err(ApiError::IdleTimeout(limit.as_secs())),
        },
        None => body.next().await.transpose(),
    }
}
