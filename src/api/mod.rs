//! HTTP contract with the remote automation server.
//!
//! - `wire`: JSON request payloads for the three endpoints.
//! - `client`: reqwest-backed [`HttpCollaborator`].
//!
//! The orchestrator only sees the [`RemoteCollaborator`] trait so tests can
//! script stream bodies and notification failures without a network.

use crate::error::ApiError;
use async_trait::async_trait;
use futures::stream::BoxStream;

mod client;
mod wire;

pub use client::HttpCollaborator;
pub use wire::{DecisionPayload, RunRequest};

/// Response header carrying the server's generated plan, when it sends one.
pub const GENERATED_OUTPUT_HEADER: &str = "LLM-Output";

/// Raw body chunks of a streaming run response, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// An accepted `/run-automation` call whose body has not been consumed yet.
pub struct RunStream {
    /// Value of the [`GENERATED_OUTPUT_HEADER`] response header.
    pub generated_output: Option<String>,
    pub body: ByteStream,
}

/// Operations the core needs from the automation server.
#[async_trait]
pub trait RemoteCollaborator: Send + Sync {
    /// Start a run. Resolves once response headers arrive with a 2xx status.
    async fn start_run(&self, request: &RunRequest) -> Result<RunStream, ApiError>;

    /// Best-effort request to stop whatever run the server has in flight.
    async fn cancel_run(&self) -> Result<(), ApiError>;

    /// Report an operator decision for one approval checkpoint.
    async fn send_decision(&self, decision: &DecisionPayload) -> Result<(), ApiError>;
}
