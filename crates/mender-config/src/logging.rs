//! Logging bootstrap for the client, wiring `Paths` and `ClientConfig` into
//! the `observability` package.

use crate::paths::Paths;

#[allow(unused_imports)]
pub use observability::{init, init_with_config, LogConfig};

/// Initializes structured logging for `service_name`, writing JSONL to
/// `paths.agent_log_file()` and mirroring to stderr. `level` is normally
/// `ClientConfig::log_level`, already resolved through any environment
/// override by `mender_config::load`.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.to_string(),
        default_level: level.to_string(),
        log_path: Some(paths.agent_log_file()),
        also_stderr: true,
    });
}
