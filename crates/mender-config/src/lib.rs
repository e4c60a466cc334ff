//! Paths and file-backed configuration for the client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{load, load_from_file, save};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, LogConfig};
pub use paths::Paths;
