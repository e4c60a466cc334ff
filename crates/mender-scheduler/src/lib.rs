//! The Scheduler collaborator: a single cooperative work item
//! that the state machine's step function runs under, plus a mutex
//! primitive for add-ons protecting their own state.
//!
//! Styled after the periodic-worker shape of
//! `message-sync-retriable-worker::MessageSyncWorker::start` and
//! `ymir::SessionManager::start_hybrid_clock_reconciliation`: one
//! `tokio::spawn`-ed task drives a `tokio::select!` loop between an
//! interval tick and an out-of-band wake notification, so firings never
//! overlap and `execute()` coalesces into the next loop iteration rather
//! than spawning a concurrent one.

mod work_item;

pub use work_item::{TokioScheduler, WorkCallback, WorkHandle};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("unknown work item handle")]
    UnknownHandle,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// `Scheduler.work_create/work_activate/work_deactivate/work_set_period/
/// work_execute/work_delete`.
pub trait Scheduler: Send + Sync {
    /// Registers (but does not activate) a new periodic work item.
    fn work_create(&self, name: &str, period: Duration, callback: WorkCallback) -> WorkHandle;
    fn work_activate(&self, handle: &WorkHandle) -> SchedulerResult<()>;
    /// Graceful: stops future firings but does not abort one in flight.
    fn work_deactivate(&self, handle: &WorkHandle) -> SchedulerResult<()>;
    fn work_set_period(&self, handle: &WorkHandle, period: Duration) -> SchedulerResult<()>;
    /// Requests an immediate out-of-band firing; coalesces with the next
    /// periodic firing rather than causing an overlapping one.
    fn work_execute(&self, handle: &WorkHandle) -> SchedulerResult<()>;
    fn work_delete(&self, handle: WorkHandle) -> SchedulerResult<()>;
}

/// A mutex primitive add-ons use to protect their own state if they run
/// additional work items. A thin wrapper so add-on code does not
/// depend on `tokio` directly, matching the collaborator-interface
/// boundary the rest of this crate observes.
pub struct SchedulerMutex<T> {
    inner: Arc<tokio::sync::Mutex<T>>,
}

impl<T> Clone for SchedulerMutex<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SchedulerMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(value)),
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, T> {
        self.inner.lock().await
    }
}
