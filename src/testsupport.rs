//! Shared test fixtures.
//!
//! `ScriptedCollaborator` stands in for the automation server in orchestrator
//! and approval tests; the HTTP helpers build raw responses for
//! `TcpListener`-backed fixture servers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::api::{DecisionPayload, RemoteCollaborator, RunRequest, RunStream};
use crate::error::ApiError;

type BodyItem = Result<Vec<u8>, ApiError>;

struct ScriptedRun {
    generated_output: Option<String>,
    body: mpsc::UnboundedReceiver<BodyItem>,
}

/// Test-side control over one scripted response body.
pub struct RunScript {
    tx: mpsc::UnboundedSender<BodyItem>,
}

impl RunScript {
    pub fn send_text(&self, text: &str) {
        self.send_bytes(text.as_bytes().to_vec());
    }

    pub fn send_bytes(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(Ok(bytes));
    }

    /// Break the body stream with `err`.
    pub fn fail(&self, err: ApiError) {
        let _ = self.tx.send(Err(err));
    }

    /// End the body stream.
    pub fn finish(self) {}
}

/// In-memory [`RemoteCollaborator`] driven by the test.
#[derive(Default)]
pub struct ScriptedCollaborator {
    runs: Mutex<VecDeque<Result<ScriptedRun, ApiError>>>,
    requests: Mutex<Vec<RunRequest>>,
    decisions: Mutex<Vec<DecisionPayload>>,
    cancel_calls: AtomicUsize,
    fail_notifications: Mutex<bool>,
    cancel_delay: Mutex<Option<Duration>>,
}

impl ScriptedCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an accepted run and return the handle that feeds its body.
    pub fn push_run(&self, generated_output: Option<&str>) -> RunScript {
        let (tx, body) = mpsc::unbounded_channel();
        self.runs.lock().expect("runs lock").push_back(Ok(ScriptedRun {
            generated_output: generated_output.map(str::to_string),
            body,
        }));
        RunScript { tx }
    }

    /// Queue a run that is refused before any body arrives.
    pub fn push_run_error(&self, err: ApiError) {
        self.runs.lock().expect("runs lock").push_back(Err(err));
    }

    /// Make every cancel and decision notification fail with a 503.
    pub fn fail_notifications(&self) {
        *self.fail_notifications.lock().expect("flag lock") = true;
    }

    pub fn delay_cancel(&self, delay: Duration) {
        *self.cancel_delay.lock().expect("delay lock") = Some(delay);
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn decisions(&self) -> Vec<DecisionPayload> {
        self.decisions.lock().expect("decisions lock").clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn notification_result(&self) -> Result<(), ApiError> {
        if *self.fail_notifications.lock().expect("flag lock") {
            Err(ApiError::Status {
                code: 503,
                body: r#"{"detail":"automation service unavailable"}"#.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteCollaborator for ScriptedCollaborator {
    async fn start_run(&self, request: &RunRequest) -> Result<RunStream, ApiError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.runs.lock().expect("runs lock").pop_front();
        let run = match next {
            Some(run) => run?,
            None => return Err(ApiError::InvalidResponse("no scripted run queued".into())),
        };
        let body = futures::stream::unfold(run.body, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        Ok(RunStream {
            generated_output: run.generated_output,
            body,
        })
    }

    async fn cancel_run(&self) -> Result<(), ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.cancel_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.notification_result()
    }

    async fn send_decision(&self, decision: &DecisionPayload) -> Result<(), ApiError> {
        self.decisions
            .lock()
            .expect("decisions lock")
            .push(decision.clone());
        self.notification_result()
    }
}

// ---------------------------------------------------------------------------
// Raw HTTP fixtures
// ---------------------------------------------------------------------------

/// One request as seen by a fixture server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Read one HTTP/1.1 request with a `Content-Length` body.
pub async fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).await.expect("read request");
        assert!(n > 0, "connection closed before request head");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = raw[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).await.expect("read body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    CapturedRequest {
        request_line,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

/// Status line and headers for a `200 OK` chunked streaming response.
pub fn chunked_response_head(extra_headers: &[(&str, &str)]) -> String {
    let mut head = String::from(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n",
    );
    for (name, value) in extra_headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    head
}

/// One chunked-transfer frame around `data`.
pub fn chunk_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = format!("{:x}\r\n", data.len()).into_bytes();
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\r\n");
    frame
}

/// Terminating zero-length chunk.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Complete JSON response with a fixed body.
pub fn fixed_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_frame_uses_hex_length() {
        assert_eq!(chunk_frame(b"0123456789abcdef!"), b"11\r\n0123456789abcdef!\r\n".to_vec());
    }

    #[test]
    fn fixed_response_sets_content_length() {
        let response = fixed_response("400 Bad Request", "{}");
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Content-Length: 2\r\n"));
        assert!(response.ends_with("\r\n\r\n{}"));
    }

    #[tokio::test]
    async fn scripted_collaborator_records_calls() {
        let remote = ScriptedCollaborator::new();
        let script = remote.push_run(None);
        let run = remote
            .start_run(&RunRequest {
                user_input: "x".into(),
                repo_name: "y".into(),
            })
            .await
            .expect("scripted run");
        script.send_text("hello");
        script.finish();
        let chunks: Vec<BodyItem> = run.body.collect().await;
        assert_eq!(chunks.len(), 1);

        remote.fail_notifications();
        assert!(remote.cancel_run().await.is_err());
        assert_eq!(remote.cancel_calls(), 1);
        assert_eq!(remote.requests().len(), 1);
    }
}
