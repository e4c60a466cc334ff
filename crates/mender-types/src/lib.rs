//! Shared data types consumed across the mender-client workspace.
//!
//! Nothing in this crate talks to the network, the filesystem, or a
//! scheduler — it is pure data plus the small amount of logic (status
//! tables, deployment-status transitions) that every other crate needs a
//! single definition of.

mod config;
mod deployment;
mod http_status;
mod keys;
mod signer;
mod state;

pub use config::ClientConfig;
pub use deployment::{DeploymentStatus, PendingDeployment};
pub use http_status::describe_status;
pub use keys::KeyPairRecord;
pub use signer::Signer;
pub use state::ClientState;
