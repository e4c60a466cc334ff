//! Deployment status and the persisted pending-deployment record.

use serde::{Deserialize, Serialize};

/// Closed set of deployment status values reportable to the server.
/// Ordering is informational only; it is not enforced by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Downloading,
    Installing,
    Rebooting,
    Success,
    Failure,
    AlreadyInstalled,
}

impl DeploymentStatus {
    /// The literal string sent in the `{"status": ...}` request body.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Downloading => "downloading",
            DeploymentStatus::Installing => "installing",
            DeploymentStatus::Rebooting => "rebooting",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failure => "failure",
            DeploymentStatus::AlreadyInstalled => "already-installed",
        }
    }
}

/// Persisted record of an in-flight update, surviving reboot. This is
/// the sole mechanism by which the post-reboot run distinguishes a
/// successful slot swap from a bootloader rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeployment {
    pub deployment_id: String,
    pub expected_artifact_name: String,
}

impl PendingDeployment {
    pub fn new(deployment_id: impl Into<String>, expected_artifact_name: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            expected_artifact_name: expected_artifact_name.into(),
        }
    }

    /// The device is considered to have successfully booted the new image
    /// if the running
    /// artifact name matches what was expected, OR (when
    /// `configuration_deployments_enabled`) the expected name is a
    /// "configuration-" deployment whose suffix matches this record's
    /// deployment_id — a configuration-only deployment never changes the
    /// running artifact.
    pub fn reconciles_with(&self, running_artifact_name: &str, configuration_deployments_enabled: bool) -> bool {
        if running_artifact_name == self.expected_artifact_name {
            return true;
        }
        if configuration_deployments_enabled {
            if let Some(suffix) = self.expected_artifact_name.strip_prefix("configuration-") {
                return suffix == self.deployment_id;
            }
        }
        false
    }
}
