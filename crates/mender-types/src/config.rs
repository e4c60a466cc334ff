//! Immutable-after-init client configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration supplied to `Client::init`. Every string field is owned and
/// deep-copied on construction; the client holds this value unchanged for its
/// whole lifetime, from `init` to `exit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Free-form device identity attributes sent as `id_data` on
    /// authentication (e.g. `{"mac": "de:ad:be:ef:00:01"}`).
    pub identity: BTreeMap<String, String>,
    /// The artifact name currently running on this device.
    pub artifact_name: String,
    /// The device type string reported to the server.
    pub device_type: String,
    /// Base URL of the update server, e.g. `https://hosted.mender.io`.
    pub server_host: String,
    /// Optional tenant token for multi-tenant server deployments.
    #[serde(default)]
    pub tenant_token: Option<String>,
    /// Poll interval while in the `authenticating` state, in seconds.
    #[serde(default = "default_auth_poll_interval_secs")]
    pub auth_poll_interval_secs: u64,
    /// Poll interval while in the `authenticated` state, in seconds.
    #[serde(default = "default_update_poll_interval_secs")]
    pub update_poll_interval_secs: u64,
    /// If true, the stored key pair is deleted and regenerated on the next
    /// `init`.
    #[serde(default)]
    pub recommissioning_flag: bool,
    /// Gates the "configuration-" deployment-name reconciliation special
    /// case (see `PendingDeployment::reconciles_with`). Defaults to enabled.
    #[serde(default = "default_true")]
    pub configuration_deployments_enabled: bool,
    /// Default log level for the observability layer (trace/debug/info/warn/error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_auth_poll_interval_secs() -> u64 {
    5
}

fn default_update_poll_interval_secs() -> u64 {
    1800
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientConfig {
    pub fn auth_poll_interval(&self) -> Duration {
        Duration::from_secs(self.auth_poll_interval_secs)
    }

    pub fn update_poll_interval(&self) -> Duration {
        Duration::from_secs(self.update_poll_interval_secs)
    }

    /// Validates the fields `Client::init` requires to be non-empty.
    /// Required flash/restart callbacks are validated by the caller, since
    /// this type carries no callback references.
    pub fn validate(&self) -> Result<(), String> {
        if self.identity.is_empty() {
            return Err("identity must not be empty".to_string());
        }
        if self.artifact_name.is_empty() {
            return Err("artifact_name must not be empty".to_string());
        }
        if self.device_type.is_empty() {
            return Err("device_type must not be empty".to_string());
        }
        if self.server_host.is_empty() {
            return Err("server_host must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ClientConfig {
        ClientConfig {
            identity: BTreeMap::from([("mac".to_string(), "de:ad:be:ef:00:01".to_string())]),
            artifact_name: "release-1.2.3".to_string(),
            device_type: "raspberrypi4".to_string(),
            server_host: "https://hosted.mender.io".to_string(),
            tenant_token: None,
            auth_poll_interval_secs: 5,
            update_poll_interval_secs: 1800,
            recommissioning_flag: false,
            configuration_deployments_enabled: true,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_identity() {
        let mut config = sample_config();
        config.identity.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_artifact_name() {
        let mut config = sample_config();
        config.artifact_name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn intervals_convert_to_durations() {
        let config = sample_config();
        assert_eq!(config.auth_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.update_poll_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn roundtrips_through_json() {
        let config = sample_config();
        let json = serde_json::to_string(&config).unwrap();
        let restored: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.artifact_name, config.artifact_name);
        assert_eq!(restored.configuration_deployments_enabled, true);
    }
}
