//! reqwest-backed automation server client.

mod transport;

use super::{DecisionPayload, RemoteCollaborator, RunRequest, RunStream, GENERATED_OUTPUT_HEADER};
use crate::config::{NetworkConfig, ServerConfig};
use crate::error::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Client for the automation server's run/cancel/approve endpoints.
#[derive(Clone)]
pub struct HttpCollaborator {
    http: reqwest::Client,
    run_url: String,
    cancel_url: String,
    approve_url: String,
    notify_timeout: Duration,
}

impl HttpCollaborator {
    /// Build a client from resolved server and network configuration.
    pub fn new(server: &ServerConfig, network: &NetworkConfig) -> Self {
        Self {
            http: transport::build_http_client(Duration::from_secs(
                network.connect_timeout_secs.max(1),
            )),
            run_url: server.endpoint(&server.run_path),
            cancel_url: server.endpoint(&server.cancel_path),
            approve_url: server.endpoint(&server.approve_path),
            notify_timeout: Duration::from_secs(network.notify_timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl RemoteCollaborator for HttpCollaborator {
    async fn start_run(&self, request: &RunRequest) -> Result<RunStream, ApiError> {
        debug!(url = %self.run_url, repo = %request.repo_name, "starting run");
        let response = self.http.post(&self.run_url).json(request).send().await?;
        let response = transport::ensure_success(response).await?;
        Ok(RunStream {
            generated_output: transport::header_text(&response, GENERATED_OUTPUT_HEADER),
            body: transport::body_stream(response),
        })
    }

    async fn cancel_run(&self) -> Result<(), ApiError> {
        debug!(url = %self.cancel_url, "sending cancel");
        let response = self
            .http
            .post(&self.cancel_url)
            .timeout(self.notify_timeout)
            .send()
            .await?;
        transport::ensure_success(response).await.map(|_| ())
    }

    async fn send_decision(&self, decision: &DecisionPayload) -> Result<(), ApiError> {
        debug!(url = %self.approve_url, task_id = %decision.task_id, approved = decision.approved, "sending decision");
        let response = self
            .http
            .post(&self.approve_url)
            .timeout(self.notify_timeout)
            .json(decision)
            .send()
            .await?;
        transport::ensure_success(response).await.map(|_| ())
    }
}
