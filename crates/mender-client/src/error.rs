//! Errors raised by `Client::init` and the collaborator wiring it performs.
//! Errors encountered during a firing (authentication, update) are logged
//! and reflected in `StepOutcome` instead — the work item keeps running.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] mender_crypto::CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] mender_storage::StorageError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] mender_scheduler::SchedulerError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Outcome of one work-item firing (one call to `Client::step`). Internal
/// bookkeeping and test assertion hook; not part of the external callback
/// surface, which stays fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The state machine advanced (e.g. `init` -> `authenticating`), or an
    /// update/auth cycle ran to completion with nothing left to do.
    Advanced,
    /// The firing did useful work but the state did not change (e.g. no
    /// deployment was offered).
    NoChange,
    /// The firing failed; the state machine stays where it was and will
    /// retry on the next scheduled firing.
    Failed,
}
