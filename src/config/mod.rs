//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`RUNSTREAM_BASE_URL`, timeouts, `NO_COLOR`).
//! 2. TOML file specified via --config CLI flag
//! 3. ./runstream.toml in the current directory
//! 4. $XDG_CONFIG_HOME/runstream/runstream.toml (or ~/.config/...)
//! 5. Built-in defaults (the embedded template)

mod defaults;
mod env;
mod loader;
mod types;

pub use loader::{config_root_dir, load_config, load_config_with_diagnostics};
pub use types::{
    ApprovalConfig, Config, ConfigDiagnostics, ConfigSource, DisplayConfig, HistoryConfig,
    LabelRule, LoadedConfig, NetworkConfig, ServerConfig,
};
