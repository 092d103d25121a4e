//! Default configuration constants.

use super::LabelRule;

/// Embedded default `runstream.toml` template.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../templates/runstream.toml");
/// Default automation server base URL.
pub(super) const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Streaming run endpoint.
pub(super) const DEFAULT_RUN_PATH: &str = "/run-automation";
/// Best-effort cancel endpoint.
pub(super) const DEFAULT_CANCEL_PATH: &str = "/cancel-automation";
/// Approval decision endpoint.
pub(super) const DEFAULT_APPROVE_PATH: &str = "/approve-action";
/// TCP/TLS connect timeout for every request.
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Whole-request timeout for cancel and approval notifications.
pub(super) const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
/// Maximum silence between two stream reads before the run is failed.
pub(super) const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 300;
/// In-band approval marker tag.
pub(super) const DEFAULT_APPROVAL_MARKER: &str = "[ApprovalRequired]";
/// Upper bound on the buffer tail re-scanned for an approval marker.
pub(super) const DEFAULT_SCAN_WINDOW_BYTES: usize = 4096;
/// Label used when no classification keyword matches.
pub(super) const DEFAULT_FALLBACK_LABEL: &str = "Executed your indicated automation task";
/// Interval between live timer events.
pub(super) const DEFAULT_TIMER_TICK_MS: u64 = 1000;

/// Ordered keyword rules for labelling completed runs. First match wins.
pub(super) fn default_label_rules() -> Vec<LabelRule> {
    [
        ("GitHub", "Creation of GitHub Actions pipeline"),
        ("Docker", "Containerization of your app with Docker"),
        ("GitLab", "Creation of GitLab CI/CD pipeline"),
        ("Kubernetes", "Deployment manifests for Kubernetes"),
    ]
    .into_iter()
    .map(|(keyword, label)| LabelRule {
        keyword: keyword.to_string(),
        label: label.to_string(),
    })
    .collect()
}
