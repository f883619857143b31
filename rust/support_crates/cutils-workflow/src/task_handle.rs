//! Per-job result handles produced by [`invoke_all`](crate::executor::invoke_all).

use std::{fmt, time::Duration};

use cutils_common::{Error, Result};

use crate::oneshot::OneshotReceiver;

/// Where a job stands from the point of view of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not finished, or finished but not yet observed through the handle.
    Pending,
    Succeeded,
    Failed,
    /// Cancelled before a result arrived. The job either never started or its
    /// result was dropped.
    Cancelled,
}

/// Completion record of one job: its status and, once settled, its value or
/// the error it ended with.
///
/// A handle settles the first time it observes the outcome, through
/// [`wait`](Self::wait), [`wait_timeout`](Self::wait_timeout),
/// [`poll`](Self::poll) or [`cancel`](Self::cancel). Handles returned from a
/// completed batch are always settled.
pub struct TaskHandle<T> {
    rx: OneshotReceiver<Result<T>>,
    slot: Slot<T>,
}

enum Slot<T> {
    Pending,
    Finished(Result<T>),
    Cancelled,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(rx: OneshotReceiver<Result<T>>) -> TaskHandle<T> {
        TaskHandle {
            rx,
            slot: Slot::Pending,
        }
    }

    /// A handle that is already settled with `outcome`.
    pub fn ready(outcome: Result<T>) -> TaskHandle<T> {
        let (_, rx) = crate::oneshot::channel();
        TaskHandle {
            rx,
            slot: Slot::Finished(outcome),
        }
    }

    /// The last observed state, without touching the channel.
    pub fn state(&self) -> TaskState {
        match &self.slot {
            Slot::Pending => TaskState::Pending,
            Slot::Finished(Ok(_)) => TaskState::Succeeded,
            Slot::Finished(Err(_)) => TaskState::Failed,
            Slot::Cancelled => TaskState::Cancelled,
        }
    }

    /// `true` once the job succeeded, failed or was cancelled.
    pub fn is_done(&self) -> bool {
        self.state() != TaskState::Pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Checks the channel without blocking and returns the resulting state.
    pub fn poll(&mut self) -> TaskState {
        if matches!(self.slot, Slot::Pending) {
            if let Ok(outcome) = self.rx.try_recv() {
                self.settle(outcome);
            }
        }
        self.state()
    }

    /// Blocks until the job settles.
    pub fn wait(&mut self) -> TaskState {
        if matches!(self.slot, Slot::Pending) {
            let outcome = self.rx.recv();
            self.settle(outcome);
        }
        self.state()
    }

    /// Blocks up to `timeout`; returns whether the job settled.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if matches!(self.slot, Slot::Pending) {
            match self.rx.recv_timeout(timeout) {
                Ok(outcome) => self.settle(outcome),
                Err(_) => return false,
            }
        }
        true
    }

    /// Cancels a job that has not produced a result yet.
    ///
    /// Returns `true` if the handle ends up cancelled by this call. When the
    /// result won the race, the handle settles with it and `false` is
    /// returned.
    pub fn cancel(&mut self) -> bool {
        if !matches!(self.slot, Slot::Pending) {
            return false;
        }
        if self.rx.close() {
            self.slot = Slot::Cancelled;
            return true;
        }
        let outcome = self.rx.try_recv().unwrap_or(None);
        self.settle(outcome);
        self.is_cancelled()
    }

    pub fn value(&self) -> Option<&T> {
        match &self.slot {
            Slot::Finished(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// The failure a failed job ended with.
    pub fn error(&self) -> Option<&Error> {
        match &self.slot {
            Slot::Finished(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Waits for the job and returns its outcome; a cancelled job yields a
    /// `Cancelled` error.
    pub fn join(mut self) -> Result<T> {
        self.wait();
        match self.slot {
            Slot::Finished(outcome) => outcome,
            Slot::Cancelled | Slot::Pending => Err(Error::cancelled()),
        }
    }

    /// A closed channel without a value means the job was dropped unrun.
    fn settle(&mut self, outcome: Option<Result<T>>) {
        self.slot = match outcome {
            Some(outcome) => Slot::Finished(outcome),
            None => Slot::Cancelled,
        };
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish()
    }
}
