//! Run a group of jobs in parallel and collect their results.
//!
//! A [`TaskGroup`] accumulates jobs and holds the executor that will run them.
//! [`TaskGroup::apply`] produces a one-shot [`Runner`]: `execute()` runs every
//! job and waits (optionally bounded by a timeout), then the outcome is read
//! through [`Runner::get`] or [`Runner::on_complete`]. The latter hands back a
//! [`CloseHandle`] that shuts the executor down.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cutils_workflow::task_group::TaskGroup;
//!
//! let mut group = TaskGroup::new();
//! group.add(|| 1).add(|| 2).add(|| 3);
//!
//! group
//!     .apply_with_timeout(Duration::from_secs(5))
//!     .execute()
//!     .on_complete(|outcome| {
//!         for handle in outcome.get().unwrap() {
//!             println!("{:?}", handle.value());
//!         }
//!     })
//!     .close();
//! ```
//!
//! Failures are reported at three levels. Invalid pool configuration is
//! returned immediately by the constructor. Failing to run the batch at all
//! (a shut-down executor, a worker thread that cannot be started, a runner
//! executed twice) ends up in the [`Try`] returned by the runner. A job that
//! fails or panics only affects its own [`TaskHandle`].
//!
//! Executing on an executor that is already shut down fails with `Rejected`
//! and leaves the jobs in the group. If the executor
//! shuts down while the batch is being submitted, the jobs of that batch are
//! gone: the submitted ones are cancelled and the rest are dropped.

use std::{fmt, sync::Arc, time::Duration};

use cutils_common::{Error, Result, verify_state};

use crate::{
    config::PoolConfig,
    executor::{self, Executor, Job},
    task_handle::TaskHandle,
    thread_pool::ThreadPool,
    try_result::Try,
};

/// Outcome of a batch: the per-job handles in submission order, or the
/// failure that prevented the batch from running.
pub type BatchResult<T> = Try<Vec<TaskHandle<T>>>;

/// Whether the group is responsible for shutting its executor down on drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

/// A collection of jobs bound to an executor.
pub struct TaskGroup<T> {
    executor: Arc<dyn Executor>,
    ownership: Ownership,
    jobs: Vec<Job<T>>,
}

impl<T> TaskGroup<T>
where
    T: Send + 'static,
{
    /// Creates a group backed by its own cached thread pool.
    pub fn new() -> Self {
        Self::owning(ThreadPool::cached())
    }

    /// Creates a group backed by its own pool built from `config`.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        Ok(Self::owning(ThreadPool::with_config(config)?))
    }

    /// Creates a group that runs its jobs on a caller-supplied executor.
    ///
    /// Dropping the group leaves the executor running, but [`close`](Self::close)
    /// (directly or through a [`CloseHandle`]) still shuts it down.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        TaskGroup {
            executor,
            ownership: Ownership::Borrowed,
            jobs: Vec::new(),
        }
    }

    fn owning(pool: ThreadPool) -> Self {
        TaskGroup {
            executor: Arc::new(pool),
            ownership: Ownership::Owned,
            jobs: Vec::new(),
        }
    }

    /// Adds a job that always produces a value. A panic counts as the job's failure.
    pub fn add<F>(&mut self, job: F) -> &mut Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.jobs.push(Box::new(move || -> Result<T> { Ok(job()) }));
        self
    }

    /// Adds a job that may fail.
    pub fn try_add<F, E>(&mut self, job: F) -> &mut Self
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        E: Into<cutils_common::error::StdErrorBoxed>,
    {
        self.jobs.push(Box::new(move || job().map_err(Error::job_failed)));
        self
    }

    /// Prepares a run with no timeout.
    pub fn apply(&mut self) -> Runner<'_, T> {
        Runner::new(self, None)
    }

    /// Prepares a run that waits at most `timeout`. A zero timeout means no
    /// timeout.
    pub fn apply_with_timeout(&mut self, timeout: Duration) -> Runner<'_, T> {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        Runner::new(self, timeout)
    }
}

impl<T> TaskGroup<T> {
    /// Number of jobs waiting to be executed.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Shuts the executor down unless it already is.
    pub fn close(&self) {
        if !self.executor.is_shutdown() {
            log::debug!("closing task group executor");
            self.executor.shutdown();
        }
    }
}

impl<T> Default for TaskGroup<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TaskGroup<T> {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned {
            self.close();
        }
    }
}

impl<T> fmt::Debug for TaskGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("jobs", &self.jobs.len())
            .field("ownership", &self.ownership)
            .field("executor_shutdown", &self.executor.is_shutdown())
            .finish()
    }
}

/// Runs the jobs of one [`TaskGroup`].
///
/// A runner is single-use: a second `execute()` replaces the outcome with an
/// `InvalidOperation` failure, and reading the outcome before `execute()`
/// yields the same kind of failure.
pub struct Runner<'g, T> {
    group: &'g mut TaskGroup<T>,
    timeout: Option<Duration>,
    outcome: Option<BatchResult<T>>,
}

impl<'g, T> Runner<'g, T>
where
    T: Send + 'static,
{
    fn new(group: &'g mut TaskGroup<T>, timeout: Option<Duration>) -> Self {
        Runner {
            group,
            timeout,
            outcome: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_executed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Runs every job of the group and waits for them.
    ///
    /// Never fails directly: whatever goes wrong at the batch level is
    /// captured in the outcome.
    pub fn execute(mut self) -> Self {
        if let Err(e) = self.check_runnable() {
            log::warn!("task group runner not executed: {e}");
            self.outcome = Some(Try::failure(e));
            return self;
        }

        let jobs = std::mem::take(&mut self.group.jobs);
        log::debug!(
            "executing {} jobs (timeout: {:?})",
            jobs.len(),
            self.timeout
        );
        let outcome = executor::invoke_all(self.group.executor.as_ref(), jobs, self.timeout);
        self.outcome = Some(outcome.into());
        self
    }

    /// A runner executes once, on an executor that still accepts work. The
    /// jobs stay in the group when this fails.
    fn check_runnable(&self) -> Result<()> {
        verify_state!(runner_not_executed, self.outcome.is_none());
        if self.group.executor.is_shutdown() {
            return Err(Error::rejected("executor is shut down"));
        }
        Ok(())
    }

    /// Returns the outcome without closing the executor.
    pub fn get(self) -> BatchResult<T> {
        self.outcome.unwrap_or_else(not_executed)
    }

    /// Passes the outcome to `consumer` and returns the token that closes the
    /// executor.
    pub fn on_complete<F>(self, consumer: F) -> CloseHandle<'g, T>
    where
        F: FnOnce(BatchResult<T>),
    {
        let Runner { group, outcome, .. } = self;
        consumer(outcome.unwrap_or_else(not_executed));
        CloseHandle { group }
    }
}

fn not_executed<T>() -> BatchResult<T> {
    Try::failure(Error::invalid_operation(
        "Runner outcome read before execute",
    ))
}

impl<T> fmt::Debug for Runner<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("group", &self.group)
            .field("timeout", &self.timeout)
            .field("executed", &self.outcome.is_some())
            .finish()
    }
}

/// Releases the executor of the group a [`Runner`] came from.
#[must_use = "call close() to shut the executor down"]
pub struct CloseHandle<'g, T> {
    group: &'g TaskGroup<T>,
}

impl<T> CloseHandle<'_, T> {
    /// Shuts down the executor if it is not already shut down.
    pub fn close(self) {
        self.group.close();
    }
}

impl<T> fmt::Debug for CloseHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("group", &self.group)
            .finish()
    }
}
