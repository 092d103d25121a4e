//! Error taxonomy for configuration, transport, and session execution.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the HTTP layer talking to the automation server.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the server.
    Status { code: u16, body: String },
    /// No bytes arrived on the response stream within the idle window.
    IdleTimeout(u64),
    /// The server answered with something the client cannot use.
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status code for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Human-readable detail for status errors.
    ///
    /// The automation server reports validation failures as
    /// `{"detail": "..."}`; prefer that string over the raw body.
    pub fn detail(&self) -> String {
        match self {
            Self::Status { code, body } => {
                let detail = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|value| {
                        value
                            .get("detail")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| body.trim().to_string());
                if detail.is_empty() {
                    format!("server returned status {code}")
                } else {
                    format!("server returned status {code}: {detail}")
                }
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body } => write!(f, "status {code}: {body}"),
            Self::IdleTimeout(secs) => write!(f, "stream idle for {secs}s"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Session-level failures.
///
/// Only `InvalidInput` and `RuntimeClosed` are ever returned to callers of the
/// orchestrator handle. The others are recorded on the session as its terminal
/// state or surfaced as warning events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Empty command or target repository; nothing was sent.
    InvalidInput(String),
    /// Request or stream failure not caused by a local cancel.
    Transport(String),
    /// The operator aborted the run.
    CancelledByOperator,
    /// An approval or cancel notification did not reach the server.
    DecisionDelivery(String),
    /// The orchestrator actor is no longer running.
    RuntimeClosed,
}

impl RunError {
    /// Text shown after the outcome label, without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::Transport(msg) | Self::DecisionDelivery(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::CancelledByOperator => write!(f, "cancelled by operator"),
            Self::DecisionDelivery(msg) => write!(f, "decision delivery failed: {msg}"),
            Self::RuntimeClosed => write!(f, "orchestrator runtime closed"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ApiError> for RunError {
    fn from(e: ApiError) -> Self {
        Self::Transport(e.detail())
    }
}
