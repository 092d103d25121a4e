//! Top-level config loading pipeline.
//!
//! Source order: explicit path > `./runstream.toml` > global file > embedded
//! defaults. Env overrides are applied last.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::defaults::DEFAULT_CONFIG_TEMPLATE;
use super::env::apply_runtime_env_overrides;
use super::{Config, ConfigDiagnostics, ConfigSource, LoadedConfig};

const LOCAL_CONFIG_FILE: &str = "runstream.toml";

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_diagnostics(path_override)?.config)
}

/// Load configuration and report where it came from.
pub fn load_config_with_diagnostics(
    path_override: Option<&str>,
) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

/// Global config root: `$XDG_CONFIG_HOME`, else `~/.config`, else the
/// platform config dir.
pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

pub(super) fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;
    let mut diagnostics = ConfigDiagnostics::default();
    validate(&mut config, &mut diagnostics)?;
    Ok(LoadedConfig {
        config,
        source,
        diagnostics,
    })
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // An explicit path must exist; every other source is optional.
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }
    if let Ok(text) = read_file(Path::new(LOCAL_CONFIG_FILE)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join("runstream").join(LOCAL_CONFIG_FILE);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }
    Ok((
        DEFAULT_CONFIG_TEMPLATE.to_string(),
        ConfigSource::BuiltInDefaults,
    ))
}

fn validate(config: &mut Config, diagnostics: &mut ConfigDiagnostics) -> Result<(), ConfigError> {
    let base_url = config.server.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "server.base_url `{base_url}` must start with http:// or https://"
        )));
    }
    if config.approval.marker.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "approval.marker must not be empty".to_string(),
        ));
    }
    if config.approval.scan_window_bytes == 0 {
        diagnostics.warnings.push(
            "approval.scan_window_bytes = 0 limits detection to single fragments".to_string(),
        );
    }
    let before = config.history.labels.len();
    config
        .history
        .labels
        .retain(|rule| !rule.keyword.trim().is_empty());
    if config.history.labels.len() != before {
        diagnostics
            .warnings
            .push("ignored history.labels entries with an empty keyword".to_string());
    }
    if config.display.timer_tick_ms == 0 {
        config.display.timer_tick_ms = 1;
        diagnostics
            .warnings
            .push("display.timer_tick_ms = 0 clamped to 1".to_string());
    }
    Ok(())
}
