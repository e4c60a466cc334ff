//! # Observability
//!
//! Centralized structured logging for the mender-client workspace.
//!
//! Every binary in the workspace calls [`init`] or [`init_with_config`] once
//! at startup and then uses the ordinary `tracing` macros. Logs are rendered
//! as one JSON object per line (timestamp, level, service, pid, target,
//! message, structured fields, source file/line) to a central file, with an
//! optional human-readable mirror on stderr for foreground runs.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("mender-agent");
//!     tracing::info!(device_type = "raspberrypi4", "agent starting");
//! }
//! ```

mod dev;
mod json_layer;

use std::path::PathBuf;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "mender-agent"). Included in every log line.
    pub service_name: String,
    /// Default log level filter. Overridden by the `RUST_LOG` environment
    /// variable when present.
    pub default_level: String,
    /// Optional custom log file path. Defaults to
    /// `~/.mender-client/logs/agent.jsonl`.
    pub log_path: Option<PathBuf>,
    /// Also emit a compact human-readable line to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service name.
///
/// # Panics
///
/// Panics if the log file cannot be created or opened.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
pub fn init_with_config(config: LogConfig) {
    dev::init_subscriber(&config);
}

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
