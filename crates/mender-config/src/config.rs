//! Loading and persisting `ClientConfig` as JSON on disk.

use crate::error::ConfigResult;
use crate::paths::Paths;
use mender_types::ClientConfig;
use std::path::Path;

const LOG_LEVEL_ENV: &str = "MENDER_CLIENT_LOG_LEVEL";
const AUTH_POLL_INTERVAL_ENV: &str = "MENDER_CLIENT_AUTH_POLL_INTERVAL_SECS";
const UPDATE_POLL_INTERVAL_ENV: &str = "MENDER_CLIENT_UPDATE_POLL_INTERVAL_SECS";

/// Loads a `ClientConfig` from the file `paths.config_file()` resolves to,
/// falling back to `default` when no file exists yet, then applies the
/// runtime-tunable environment overrides on top either way.
///
/// Identity, artifact name, device type, server host, and the tenant token
/// are not overridable this way — they describe what device this is and
/// where it reports to, and changing them behind the running client's back
/// would be a correctness hazard, not a convenience.
pub fn load(paths: &Paths, default: impl FnOnce() -> ClientConfig) -> ConfigResult<ClientConfig> {
    let config_path = paths.config_file();

    let mut config = if config_path.exists() {
        load_from_file(&config_path)?
    } else {
        default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Loads a `ClientConfig` from a specific file, with no environment
/// overrides or default fallback applied.
pub fn load_from_file(path: &Path) -> ConfigResult<ClientConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Serializes `config` as pretty JSON to `paths.config_file()`, creating the
/// base directory first if it does not exist yet.
pub fn save(config: &ClientConfig, paths: &Paths) -> ConfigResult<()> {
    paths.ensure_dirs()?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(paths.config_file(), content)?;
    Ok(())
}

fn apply_env_overrides(config: &mut ClientConfig) {
    if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV) {
        config.log_level = log_level;
    }
    if let Some(secs) = parse_u64_env(AUTH_POLL_INTERVAL_ENV) {
        config.auth_poll_interval_secs = secs;
    }
    if let Some(secs) = parse_u64_env(UPDATE_POLL_INTERVAL_ENV) {
        config.update_poll_interval_secs = secs;
    }
}

fn parse_u64_env(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
