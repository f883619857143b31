//! Parallel task execution on thread pools.
//!
//! # Key Components
//!
//! ## Task Groups
//!
//! - [`task_group::TaskGroup`] - collects jobs, runs them together through a
//!   one-shot [`task_group::Runner`] and hands back per-job
//!   [`task_handle::TaskHandle`]s wrapped in a [`try_result::Try`]
//!
//! ## Executors
//!
//! - [`executor::Executor`] - the seam a task group runs on, plus
//!   [`executor::invoke_all`] for running a batch with an optional timeout
//! - [`thread_pool::ThreadPool`] - on-demand worker threads, fixed or
//!   unbounded, configured by [`config::PoolConfig`]
//!
//! ## Communication
//!
//! - [`oneshot`] - single-value channel carrying each task's outcome
//! - [`join_handle`] - waiting on closures spawned directly on a pool

pub mod config;
pub mod executor;
pub mod join_handle;
pub mod oneshot;
pub mod task_group;
pub mod task_handle;
pub mod thread_pool;
pub mod try_result;

pub use config::PoolConfig;
pub use executor::Executor;
pub use task_group::{CloseHandle, Runner, TaskGroup};
pub use task_handle::{TaskHandle, TaskState};
pub use thread_pool::ThreadPool;
pub use try_result::Try;
