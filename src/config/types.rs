//! Configuration data model.
//!
//! Struct/enum definitions plus their default values. Source discovery and
//! env precedence live in `loader` and `env`.

use serde::Deserialize;
use std::path::PathBuf;

use super::defaults::{
    default_label_rules, DEFAULT_APPROVAL_MARKER, DEFAULT_APPROVE_PATH, DEFAULT_BASE_URL,
    DEFAULT_CANCEL_PATH, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FALLBACK_LABEL,
    DEFAULT_NOTIFY_TIMEOUT_SECS, DEFAULT_RUN_PATH, DEFAULT_SCAN_WINDOW_BYTES,
    DEFAULT_STREAM_IDLE_TIMEOUT_SECS, DEFAULT_TIMER_TICK_MS,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub approval: ApprovalConfig,
    pub history: HistoryConfig,
    pub display: DisplayConfig,
}

/// Automation server location and endpoint paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub run_path: String,
    pub cancel_path: String,
    pub approve_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            run_path: DEFAULT_RUN_PATH.to_string(),
            cancel_path: DEFAULT_CANCEL_PATH.to_string(),
            approve_path: DEFAULT_APPROVE_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Join the base URL with one endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Network/HTTP timeout policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for cancel/approve notifications.
    pub notify_timeout_secs: u64,
    /// Maximum gap between stream reads. `0` disables the check.
    pub stream_idle_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            notify_timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            stream_idle_timeout_secs: DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
        }
    }
}

/// In-band approval marker detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Literal tag that opens an approval line.
    pub marker: String,
    pub scan_window_bytes: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_APPROVAL_MARKER.to_string(),
            scan_window_bytes: DEFAULT_SCAN_WINDOW_BYTES,
        }
    }
}

/// One ordered classification rule for completed runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelRule {
    /// Case-sensitive substring searched for in the final buffer.
    pub keyword: String,
    pub label: String,
}

/// History-ledger labelling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub labels: Vec<LabelRule>,
    pub fallback_label: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            labels: default_label_rules(),
            fallback_label: DEFAULT_FALLBACK_LABEL.to_string(),
        }
    }
}

/// Display / rendering preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
    /// Interval between live timer events, in milliseconds.
    pub timer_tick_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            timer_tick_ms: DEFAULT_TIMER_TICK_MS,
        }
    }
}

/// Where the active configuration text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicit `--config` path.
    Explicit(PathBuf),
    /// `./runstream.toml`.
    Local,
    /// `$XDG_CONFIG_HOME/runstream/runstream.toml`.
    Global(PathBuf),
    /// No file found; embedded template used.
    BuiltInDefaults,
}

/// Diagnostics captured while resolving runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigDiagnostics {
    /// Non-fatal problems that were corrected or ignored.
    pub warnings: Vec<String>,
}

/// Configuration payload plus load-time diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
    pub diagnostics: ConfigDiagnostics,
}
