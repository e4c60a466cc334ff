//! File system paths for the client.

use crate::error::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Overrides the base directory that would otherwise default to
/// `~/.mender-client`. Intended for tests and for running multiple devices
/// side by side on one host.
const BASE_DIR_ENV: &str = "MENDER_CLIENT_HOME";

/// Resolves the on-disk locations the client reads and writes: the
/// configuration file, the key-value store file, and the log directory all
/// live under one base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Uses `$MENDER_CLIENT_HOME` if set, otherwise `~/.mender-client`.
    pub fn new() -> ConfigResult<Self> {
        if let Ok(override_dir) = std::env::var(BASE_DIR_ENV) {
            return Ok(Self::with_base_dir(PathBuf::from(override_dir)));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Path("could not determine home directory".to_string()))?;

        Ok(Self::with_base_dir(home.join(".mender-client")))
    }

    /// Builds a `Paths` rooted at an explicit directory, bypassing both the
    /// environment variable and the home-directory lookup.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// The persisted `ClientConfig`, as JSON.
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// The key-value store backing `SecureStorage` (auth keys, pending
    /// deployment, per-addon device configuration).
    pub fn store_file(&self) -> PathBuf {
        self.base_dir.join("store.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn agent_log_file(&self) -> PathBuf {
        self.logs_dir().join("agent.jsonl")
    }

    /// Creates the base directory and the log directory if absent.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("failed to determine mender-client home directory")
    }
}
