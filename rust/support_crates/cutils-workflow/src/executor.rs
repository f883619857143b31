//! The executor abstraction and the batch "invoke all" primitive built on it.

use std::{
    panic::AssertUnwindSafe,
    time::{Duration, Instant},
};

use cutils_common::{Error, Result, error::panic_message};

use crate::{
    oneshot::{self, OneshotSender},
    task_handle::TaskHandle,
};

/// A boxed unit of work handed to an [`Executor`].
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A job producing `T` or failing; see [`TaskGroup`](crate::task_group::TaskGroup).
pub type Job<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Something that runs submitted tasks on other threads.
///
/// Implementations move forward through three states: running, shut down
/// (no new submissions, queued work still drains) and terminated (all work
/// finished, no worker left).
pub trait Executor: Send + Sync {
    /// Submits a task. Fails with `Rejected` once the executor is shut down.
    fn execute(&self, task: TaskFn) -> Result<()>;

    /// Stops accepting work. Calling it again is a no-op.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;

    fn is_terminated(&self) -> bool;

    /// Blocks until the executor terminates or `timeout` elapses. Returns
    /// whether it terminated.
    fn await_termination(&self, timeout: Duration) -> bool;
}

/// Runs every job on `executor` and waits for them.
///
/// The returned handles are in job order and all settled. With a `timeout`,
/// the wait ends at the deadline (counted from the start of submission) and
/// every handle still pending is cancelled. A submission failure cancels the
/// handles submitted so far and is returned as the error.
pub fn invoke_all<T>(
    executor: &dyn Executor,
    jobs: Vec<Job<T>>,
    timeout: Option<Duration>,
) -> Result<Vec<TaskHandle<T>>>
where
    T: Send + 'static,
{
    // A deadline past what `Instant` can represent waits for every job.
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let mut handles = Vec::with_capacity(jobs.len());
    let mut pending = Vec::with_capacity(jobs.len());
    for job in jobs {
        let (tx, rx) = oneshot::channel();
        handles.push(TaskHandle::new(rx));
        pending.push((job, tx));
    }

    for (job, tx) in pending {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            // Unsubmitted jobs drop their senders here; cancel_pending below
            // marks their handles.
            break;
        }
        if let Err(e) = executor.execute(Box::new(move || run_job(job, tx))) {
            log::warn!("job submission rejected: {e}");
            cancel_pending(&mut handles);
            return Err(e);
        }
    }

    match deadline {
        None => {
            for handle in handles.iter_mut() {
                handle.wait();
            }
        }
        Some(deadline) => {
            for handle in handles.iter_mut() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() || !handle.wait_timeout(remaining) {
                    break;
                }
            }
            let cancelled = cancel_pending(&mut handles);
            if cancelled > 0 {
                log::warn!(
                    "{cancelled} of {} jobs cancelled after {:?} timeout",
                    handles.len(),
                    timeout.unwrap_or_default()
                );
            }
        }
    }
    Ok(handles)
}

/// Executes one job on a worker thread, unless its handle was cancelled
/// before the worker got to it.
fn run_job<T>(job: Job<T>, tx: OneshotSender<Result<T>>) {
    if !tx.is_pending() {
        log::trace!("skipping cancelled job");
        return;
    }
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(Error::job_panicked(panic_message(payload.as_ref()))));
    if tx.send(outcome).is_err() {
        log::trace!("job finished after cancellation, result dropped");
    }
}

fn cancel_pending<T>(handles: &mut [TaskHandle<T>]) -> usize {
    handles
        .iter_mut()
        .filter(|handle| !handle.is_done())
        .map(|handle| handle.cancel())
        .filter(|&cancelled| cancelled)
        .count()
}
