//! JSON request bodies.
//!
//! Field names follow the server's snake_case contract exactly.

use serde::{Deserialize, Serialize};

/// Body of `POST /run-automation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub user_input: String,
    pub repo_name: String,
}

/// Body of `POST /approve-action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub task_id: String,
    pub approved: bool,
    pub edited_command: String,
}
