//! `TokioScheduler`: the production `Scheduler` implementation.

use crate::{BoxFuture, Scheduler, SchedulerError, SchedulerResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub type WorkCallback = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

/// Opaque handle to a registered work item, returned by `work_create`.
#[derive(Clone)]
pub struct WorkHandle {
    id: u64,
}

struct RunningWorkItem {
    active: Arc<AtomicBool>,
    notify: Arc<Notify>,
    period: Arc<Mutex<Duration>>,
    period_changed: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Drives every registered work item on its own `tokio::spawn`-ed task.
/// Each task is a single `tokio::select!` loop: it never fires itself
/// concurrently, and `work_execute` coalesces with whichever `select!`
/// branch wins next rather than spawning a second invocation.
#[derive(Default)]
pub struct TokioScheduler {
    next_id: AtomicU64,
    items: Mutex<HashMap<u64, RunningWorkItem>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TokioScheduler {
    fn work_create(&self, name: &str, period: Duration, callback: WorkCallback) -> WorkHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let period_cell = Arc::new(Mutex::new(period));
        let period_changed = Arc::new(Notify::new());

        let task_active = Arc::clone(&active);
        let task_notify = Arc::clone(&notify);
        let task_period = Arc::clone(&period_cell);
        let task_period_changed = Arc::clone(&period_changed);
        let task_name = name.to_string();

        let task = tokio::spawn(async move {
            loop {
                let current_period = *task_period.lock().unwrap();
                let mut ticker = tokio::time::interval(current_period);
                ticker.tick().await; // interval's first tick fires immediately; consume it.

                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_notify.notified() => {}
                    _ = task_period_changed.notified() => {
                        continue;
                    }
                }

                if task_active.load(Ordering::SeqCst) {
                    tracing::debug!(work_item = %task_name, "firing work item");
                    (callback)().await;
                }
            }
        });

        self.items.lock().unwrap().insert(
            id,
            RunningWorkItem {
                active,
                notify,
                period: period_cell,
                period_changed,
                task,
            },
        );

        WorkHandle { id }
    }

    fn work_activate(&self, handle: &WorkHandle) -> SchedulerResult<()> {
        let items = self.items.lock().unwrap();
        let item = items.get(&handle.id).ok_or(SchedulerError::UnknownHandle)?;
        item.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn work_deactivate(&self, handle: &WorkHandle) -> SchedulerResult<()> {
        let items = self.items.lock().unwrap();
        let item = items.get(&handle.id).ok_or(SchedulerError::UnknownHandle)?;
        item.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn work_set_period(&self, handle: &WorkHandle, period: Duration) -> SchedulerResult<()> {
        let items = self.items.lock().unwrap();
        let item = items.get(&handle.id).ok_or(SchedulerError::UnknownHandle)?;
        *item.period.lock().unwrap() = period;
        item.period_changed.notify_one();
        Ok(())
    }

    fn work_execute(&self, handle: &WorkHandle) -> SchedulerResult<()> {
        let items = self.items.lock().unwrap();
        let item = items.get(&handle.id).ok_or(SchedulerError::UnknownHandle)?;
        item.notify.notify_one();
        Ok(())
    }

    fn work_delete(&self, handle: WorkHandle) -> SchedulerResult<()> {
        let mut items = self.items.lock().unwrap();
        let item = items.remove(&handle.id).ok_or(SchedulerError::UnknownHandle)?;
        item.task.abort();
        Ok(())
    }
}
