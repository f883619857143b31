//! Thread pool implementation for concurrent task execution.
//!
//! This module provides a thread pool that starts worker threads on demand,
//! reuses idle ones and retires surplus workers after a keep-alive period.
//! Work items can be submitted for execution and either waited on for
//! completion (using [`JoinHandle`]) or executed in a fire-and-forget manner.
//! The pool is also the default [`Executor`] behind a
//! [`TaskGroup`](crate::task_group::TaskGroup).

use std::{
    collections::VecDeque,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use cutils_common::{Error, Result, error::panic_message};

use crate::{
    config::PoolConfig,
    executor::{Executor, TaskFn},
    join_handle::JoinHandle,
    oneshot,
};

/// A thread pool for executing concurrent tasks.
///
/// Sizing follows the [`PoolConfig`] the pool was built with:
/// [`ThreadPool::cached`] grows without bound, [`ThreadPool::new`] runs a
/// fixed number of workers.
///
/// ## Cloning
///
/// `ThreadPool` implements [`Clone`] and all clones share the same underlying
/// workers. When the last clone is dropped the pool shuts down; queued work
/// still runs to completion.
///
/// ## Thread Safety
///
/// All methods on `ThreadPool` are thread-safe and can be called concurrently
/// from multiple threads.
#[derive(Clone)]
pub struct ThreadPool(Arc<PoolHandle>);

/// Owned by `ThreadPool` clones only; workers hold the `Shared` part, so
/// dropping the last clone can shut the pool down.
struct PoolHandle(Arc<Shared>);

struct Shared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
    next_worker_index: AtomicUsize,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<TaskFn>,
    workers: usize,
    idle: usize,
    shutdown: bool,
}

impl ThreadPool {
    /// Creates a pool of `num_threads` long-lived workers.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is 0.
    pub fn new(num_threads: usize) -> Self {
        assert_ne!(num_threads, 0);
        Self::from_config(PoolConfig::fixed(num_threads))
    }

    /// Creates an unbounded pool that starts threads as needed and reuses
    /// idle ones.
    pub fn cached() -> Self {
        Self::from_config(PoolConfig::cached())
    }

    /// Creates a pool from an explicit configuration.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: PoolConfig) -> Self {
        log::debug!(
            "creating thread pool: min={}, max={:?}, keep_alive={:?}",
            config.min_threads,
            config.max_threads,
            config.keep_alive
        );
        ThreadPool(Arc::new(PoolHandle(Arc::new(Shared {
            config,
            state: Mutex::new(PoolState::default()),
            work_available: Condvar::new(),
            terminated: Condvar::new(),
            next_worker_index: AtomicUsize::new(0),
        }))))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared().config
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared().lock().workers
    }

    /// Spawns a closure on the pool and returns a handle to wait for its result.
    ///
    /// A panic inside `f` is caught and reported through the handle.
    pub fn spawn<F, R>(&self, f: F) -> Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx_result, rx_result) = oneshot::channel::<Result<R>>();
        self.spawn_detached(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| Error::job_panicked(panic_message(payload.as_ref())));
            let _ = tx_result.send(result); // Ignore send errors if receiver is dropped
        })?;
        Ok(JoinHandle::new(rx_result))
    }

    /// Spawns a closure without a way to wait for it.
    pub fn spawn_detached<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(f))
    }

    fn shared(&self) -> &Arc<Shared> {
        &(self.0).0
    }

    fn submit(&self, task: TaskFn) -> Result<()> {
        let shared = self.shared();
        let mut state = shared.lock();
        if state.shutdown {
            return Err(Error::rejected("thread pool is shut down"));
        }

        let can_grow = shared
            .config
            .max_threads
            .is_none_or(|max| state.workers < max);
        if state.idle > state.queue.len() || !can_grow {
            state.queue.push_back(task);
            drop(state);
            shared.work_available.notify_one();
            return Ok(());
        }

        state.workers += 1;
        drop(state);
        if let Err(e) = Shared::start_worker(shared, task) {
            let mut state = shared.lock();
            state.workers -= 1;
            shared.notify_if_terminated(&state);
            return Err(Error::io("failed to start worker thread", e));
        }
        Ok(())
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_worker(shared: &Arc<Shared>, first_task: TaskFn) -> std::io::Result<()> {
        let index = shared.next_worker_index.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new();
        if !shared.config.thread_name_prefix.is_empty() {
            builder = builder.name(format!("{}-{index}", shared.config.thread_name_prefix));
        }
        let worker = shared.clone();
        builder.spawn(move || worker.thread_fn(first_task))?;
        log::trace!("started worker {index}");
        Ok(())
    }

    /// Worker thread function: runs its first task, then whatever the queue
    /// hands it until it retires or the pool drains after shutdown.
    fn thread_fn(&self, first_task: TaskFn) {
        let mut task = Some(first_task);
        while let Some(next) = task {
            Self::run_task(next);
            task = self.next_task();
        }
    }

    fn run_task(task: TaskFn) {
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(task)) {
            log::warn!(
                "task panicked on worker thread: {}",
                panic_message(payload.as_ref())
            );
        }
    }

    /// Blocks until there is work for this worker. Returns `None` when the
    /// worker should exit, after it has been removed from the worker count.
    fn next_task(&self) -> Option<TaskFn> {
        let mut state = self.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                break;
            }

            state.idle += 1;
            let timed_out = if state.workers > self.config.min_threads {
                let (guard, res) = self
                    .work_available
                    .wait_timeout(state, self.config.keep_alive)
                    .unwrap_or_else(PoisonError::into_inner);
                state = guard;
                res.timed_out()
            } else {
                state = self
                    .work_available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                false
            };
            state.idle -= 1;

            if timed_out && state.queue.is_empty() && state.workers > self.config.min_threads {
                log::trace!("idle worker retiring");
                break;
            }
        }

        state.workers -= 1;
        self.notify_if_terminated(&state);
        None
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        log::debug!(
            "shutting down thread pool: {} workers, {} queued tasks",
            state.workers,
            state.queue.len()
        );
        self.notify_if_terminated(&state);
        drop(state);
        self.work_available.notify_all();
    }

    fn notify_if_terminated(&self, state: &PoolState) {
        if state.shutdown && state.workers == 0 {
            self.terminated.notify_all();
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, task: TaskFn) -> Result<()> {
        self.submit(task)
    }

    fn shutdown(&self) {
        self.shared().shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.shared().lock().shutdown
    }

    fn is_terminated(&self) -> bool {
        let state = self.shared().lock();
        state.shutdown && state.workers == 0
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let shared = self.shared();
        let state = shared.lock();
        let (state, _) = shared
            .terminated
            .wait_timeout_while(state, timeout, |state| {
                !(state.shutdown && state.workers == 0)
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.shutdown && state.workers == 0
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

impl Default for ThreadPool {
    /// Same as [`ThreadPool::cached`].
    fn default() -> Self {
        Self::cached()
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared().lock();
        f.debug_struct("ThreadPool")
            .field("workers", &state.workers)
            .field("idle", &state.idle)
            .field("queued", &state.queue.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, Mutex},
        time::Instant,
    };

    #[test]
    #[should_panic]
    fn test_new_thread_pool_zero_threads() {
        ThreadPool::new(0);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = PoolConfig {
            max_threads: Some(0),
            ..PoolConfig::cached()
        };
        assert!(ThreadPool::with_config(config).is_err());
    }

    #[test]
    fn test_spawn_simple_task() {
        let pool = ThreadPool::new(2);
        let handle = pool.spawn(|| 42).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn test_spawn_multiple_tasks() {
        let pool = ThreadPool::new(2);
        let handles: Vec<_> = (0..10)
            .map(|i| pool.spawn(move || i * 2).unwrap())
            .collect();

        let results = JoinHandle::join_all(handles);
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), i * 2);
        }
    }

    #[test]
    fn test_fixed_pool_never_exceeds_size() {
        let pool = ThreadPool::new(2);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                pool.spawn(|| std::thread::sleep(Duration::from_millis(10)))
                    .unwrap()
            })
            .collect();
        assert!(pool.worker_count() <= 2);
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.worker_count() <= 2);
    }

    #[test]
    fn test_cached_pool_grows_with_demand() {
        let pool = ThreadPool::cached();
        let start_time = Instant::now();
        let sleep_duration = Duration::from_millis(100);

        let handles: Vec<_> = (0..6)
            .map(|_| pool.spawn(move || std::thread::sleep(sleep_duration)).unwrap())
            .collect();
        assert_eq!(pool.worker_count(), 6);
        for handle in handles {
            handle.join().unwrap();
        }
        // All six ran side by side.
        assert!(start_time.elapsed() < sleep_duration * 3);
    }

    #[test]
    fn test_cached_pool_reuses_idle_workers() {
        let pool = ThreadPool::cached();
        pool.spawn(|| ()).unwrap().join().unwrap();
        // Give the worker a moment to go idle.
        std::thread::sleep(Duration::from_millis(50));
        pool.spawn(|| ()).unwrap().join().unwrap();
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn test_idle_workers_retire_after_keep_alive() {
        let config = PoolConfig::cached().with_keep_alive(Duration::from_millis(30));
        let pool = ThreadPool::with_config(config).unwrap();
        pool.spawn(|| ()).unwrap().join().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.worker_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.worker_count(), 0);
        // Retired workers are replaced on demand.
        assert_eq!(pool.spawn(|| 1).unwrap().join().unwrap(), 1);
    }

    #[test]
    fn test_thread_names_follow_prefix() {
        let config = PoolConfig::fixed(1).with_thread_name_prefix("render");
        let pool = ThreadPool::with_config(config).unwrap();
        let name = pool
            .spawn(|| std::thread::current().name().map(str::to_string))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("render-0"));
    }

    #[test]
    fn test_panicking_task_does_not_kill_pool() {
        let pool = ThreadPool::new(1);
        let err = pool
            .spawn(|| -> u8 { panic!("worker boom") })
            .unwrap()
            .join()
            .unwrap_err();
        assert!(err.to_string().contains("worker boom"));
        assert_eq!(pool.spawn(|| 8).unwrap().join().unwrap(), 8);
    }

    #[test]
    fn test_spawn_detached_with_shared_state() {
        let pool = ThreadPool::new(4);
        let shared_vec = Arc::new(Mutex::new(Vec::new()));

        let num_tasks = 20;
        for i in 0..num_tasks {
            let shared_vec = shared_vec.clone();
            pool.spawn_detached(move || {
                shared_vec.lock().unwrap().push(i);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));

        let mut sorted_vec = shared_vec.lock().unwrap().clone();
        sorted_vec.sort();
        let expected: Vec<_> = (0..num_tasks).collect();
        assert_eq!(sorted_vec, expected);
    }

    #[test]
    fn test_shutdown_rejects_and_terminates() {
        let pool = ThreadPool::new(2);
        let handle = pool
            .spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                "queued before shutdown"
            })
            .unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool.spawn(|| 1).is_err());
        assert_eq!(handle.join().unwrap(), "queued before shutdown");
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(pool.is_terminated());
        pool.shutdown();
        assert!(pool.is_terminated());
    }

    #[test]
    fn test_unused_pool_terminates_immediately() {
        let pool = ThreadPool::cached();
        assert!(!pool.is_terminated());
        pool.shutdown();
        assert!(pool.is_terminated());
    }

    #[test]
    fn test_dropping_last_clone_shuts_down() {
        let pool = ThreadPool::new(2);
        let shared = Arc::clone(pool.shared());
        let clone = pool.clone();
        drop(pool);
        assert!(!shared.lock().shutdown);
        drop(clone);
        assert!(shared.lock().shutdown);
    }

    #[test]
    fn test_recursive_task_spawning() {
        let pool = ThreadPool::new(2);
        let pool_clone = pool.clone();

        let handle = pool
            .spawn(move || {
                let inner_handle = pool_clone.spawn(|| 100).unwrap();
                inner_handle.join().unwrap() + 50
            })
            .unwrap();

        assert_eq!(handle.join().unwrap(), 150);
    }

    #[test]
    fn test_stress_with_random_sleeps() {
        let pool = ThreadPool::cached();
        let handles: Vec<_> = (0..200u64)
            .map(|i| {
                let sleep = Duration::from_micros(fastrand::u64(0..500));
                pool.spawn(move || {
                    std::thread::sleep(sleep);
                    i * i
                })
                .unwrap()
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), (i * i) as u64);
        }
    }
}
