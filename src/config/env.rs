//! Environment variable overrides.
//!
//! `RUNSTREAM_*` variables win over any file value. `NO_COLOR` follows the
//! usual convention: any non-empty value disables color.

use crate::error::ConfigError;

use super::Config;

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty(env_lookup, "RUNSTREAM_BASE_URL") {
        config.server.base_url = url;
    }
    if let Some(secs) = parse_secs(env_lookup, "RUNSTREAM_CONNECT_TIMEOUT_SECS")? {
        // Zero would mean "fail immediately"; clamp to one second.
        config.network.connect_timeout_secs = secs.max(1);
    }
    if let Some(secs) = parse_secs(env_lookup, "RUNSTREAM_NOTIFY_TIMEOUT_SECS")? {
        config.network.notify_timeout_secs = secs.max(1);
    }
    if let Some(secs) = parse_secs(env_lookup, "RUNSTREAM_STREAM_IDLE_TIMEOUT_SECS")? {
        // Zero is meaningful here: it disables the idle check.
        config.network.stream_idle_timeout_secs = secs;
    }
    if non_empty(env_lookup, "NO_COLOR").is_some() {
        config.display.color = false;
    }
    Ok(())
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_secs<FEnv>(env_lookup: &FEnv, name: &str) -> Result<Option<u64>, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(env_lookup, name) else {
        return Ok(None);
    };
    raw.parse::<u64>().map(Some).map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected non-negative integer seconds"
        ))
    })
}
