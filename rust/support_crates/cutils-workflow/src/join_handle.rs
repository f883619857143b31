//! Handle for closures spawned directly on a [`ThreadPool`](crate::thread_pool::ThreadPool).
//!
//! Unlike [`TaskHandle`](crate::task_handle::TaskHandle), a `JoinHandle` has no
//! cancellation: it exists to wait for a single closure and take its result.

use std::time::Duration;

use cutils_common::{Error, Result};

use crate::oneshot::{self, OneshotReceiver};

/// A handle for waiting on the result of a spawned closure.
///
/// ## Lifecycle
///
/// 1. **Created**: returned by [`ThreadPool::spawn`](crate::thread_pool::ThreadPool::spawn)
/// 2. **Pending**: the closure is queued or running
/// 3. **Ready**: the closure returned or panicked
/// 4. **Consumed**: the result was taken via [`join()`](Self::join)
pub struct JoinHandle<R>(OneshotReceiver<Result<R>>);

impl<R> JoinHandle<R> {
    pub(crate) fn new(rx: OneshotReceiver<Result<R>>) -> JoinHandle<R> {
        JoinHandle(rx)
    }

    /// Creates a `JoinHandle` that is immediately ready with the given result.
    pub fn ready(res: R) -> Self {
        Self(oneshot::ready(Ok(res)))
    }

    /// Checks if the result is ready without blocking.
    pub fn is_ready(&self) -> bool {
        !self.0.is_pending()
    }

    /// Waits for the closure and returns its result.
    ///
    /// A panic in the closure comes back as a `JobPanicked` error. If the
    /// closure was dropped without running, the error is `Cancelled`.
    pub fn join(self) -> Result<R> {
        self.0.recv().unwrap_or_else(|| Err(Error::cancelled()))
    }

    /// Like [`join()`](Self::join) but gives the handle back if the closure
    /// has not finished within `timeout`.
    pub fn join_timeout(self, timeout: Duration) -> std::result::Result<Result<R>, Self> {
        match self.0.recv_timeout(timeout) {
            Ok(res) => Ok(res.unwrap_or_else(|| Err(Error::cancelled()))),
            Err(_) => Err(self),
        }
    }

    /// Waits for all handles, collecting their results in input order.
    pub fn join_all(handles: impl IntoIterator<Item = JoinHandle<R>>) -> Vec<Result<R>> {
        handles.into_iter().map(|h| h.join()).collect()
    }
}
