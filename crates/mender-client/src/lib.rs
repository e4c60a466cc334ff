//! The client state machine: orchestrates `init` ->
//! `authenticating` -> `authenticated`, owns the pending-deployment
//! record, and drives the artifact download through the registered
//! payload-type handlers.

mod callbacks;
mod client;
mod error;
mod handlers;

pub use callbacks::{AuthResultCallback, ClientCallbacks, RestartCallback};
pub use client::Client;
pub use error::{ClientError, ClientResult, StepOutcome};
pub use handlers::{HandlerEntry, PayloadTypeHandler, RootfsImageHandler};
