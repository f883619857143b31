//! A single-value channel used to hand a task's outcome from a worker thread
//! back to whoever is waiting on it.
//!
//! Exactly one [`OneshotSender`] and one [`OneshotReceiver`] exist per channel.
//! The receiver can close the channel while it is still pending, which is how
//! task cancellation is expressed: the worker observes the closed channel and
//! either skips the work entirely or drops the value it produced.
//!
//! ## Channel Lifecycle
//!
//! 1. Pending: no value yet, the sender is alive
//! 2. Ready: a value has been sent and not yet taken
//! 3. Closed: the value was taken, the receiver closed the channel, or the
//!    sender was dropped without sending

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Creates a new pending channel.
pub fn channel<T>() -> (OneshotSender<T>, OneshotReceiver<T>) {
    let cell = Arc::new(Cell::new(Slot::Pending));
    (OneshotSender(cell.clone()), OneshotReceiver(cell))
}

/// Creates a receiver that already holds `value`.
pub fn ready<T>(value: T) -> OneshotReceiver<T> {
    OneshotReceiver(Arc::new(Cell::new(Slot::Ready(value))))
}

/// Returned by [`OneshotReceiver::recv_timeout`] when the channel is still
/// pending after the timeout elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout;

/// The sending half. Dropping it without sending closes the channel.
pub struct OneshotSender<T>(Arc<Cell<T>>);

impl<T> OneshotSender<T> {
    /// Delivers `value`. Fails with the value when the receiver has already
    /// closed the channel.
    pub fn send(self, value: T) -> Result<(), T> {
        self.0.put(value)
    }

    /// `true` while nobody has closed the channel and no value was sent.
    pub fn is_pending(&self) -> bool {
        self.0.lock().is_pending()
    }
}

impl<T> Drop for OneshotSender<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// The receiving half.
pub struct OneshotReceiver<T>(Arc<Cell<T>>);

impl<T> OneshotReceiver<T> {
    /// Blocks until the channel leaves the pending state.
    ///
    /// Returns `None` when the channel was closed without a value.
    pub fn recv(&self) -> Option<T> {
        let guard = self.0.lock();
        let mut guard = self
            .0
            .changed
            .wait_while(guard, |slot| slot.is_pending())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, Timeout> {
        let guard = self.0.lock();
        let (mut guard, res) = self
            .0
            .changed
            .wait_timeout_while(guard, timeout, |slot| slot.is_pending())
            .unwrap_or_else(PoisonError::into_inner);
        if res.timed_out() && guard.is_pending() {
            Err(Timeout)
        } else {
            Ok(guard.take())
        }
    }

    /// Non-blocking receive; `Err(Timeout)` means the value is not there yet.
    pub fn try_recv(&self) -> Result<Option<T>, Timeout> {
        let mut guard = self.0.lock();
        if guard.is_pending() {
            Err(Timeout)
        } else {
            Ok(guard.take())
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.lock().is_pending()
    }

    /// Closes a pending channel. Returns `false` if the channel had already
    /// left the pending state, in which case any sent value is still
    /// available through [`try_recv`](Self::try_recv).
    pub fn close(&self) -> bool {
        self.0.close()
    }
}

struct Cell<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T> Cell<T> {
    fn new(slot: Slot<T>) -> Cell<T> {
        Cell {
            slot: Mutex::new(slot),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, value: T) -> Result<(), T> {
        let mut slot = self.lock();
        if !slot.is_pending() {
            return Err(value);
        }
        *slot = Slot::Ready(value);
        drop(slot);
        self.changed.notify_all();
        Ok(())
    }

    fn close(&self) -> bool {
        let mut slot = self.lock();
        if !slot.is_pending() {
            return false;
        }
        *slot = Slot::Closed;
        drop(slot);
        self.changed.notify_all();
        true
    }
}

enum Slot<T> {
    Pending,
    Ready(T),
    Closed,
}

impl<T> Slot<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    /// Moves a ready value out, leaving the slot closed.
    fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Slot::Closed) {
            Slot::Ready(value) => Some(value),
            Slot::Pending => {
                *self = Slot::Pending;
                None
            }
            Slot::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::UnsafeCell, time::Duration};

    use super::{OneshotReceiver, OneshotSender, Timeout, channel, ready};

    #[test]
    fn test_oneshot_send_sync() {
        fn is_send_sync<T: Send + Sync>() {}

        fn test<T: Send>() {
            is_send_sync::<OneshotReceiver<T>>();
            is_send_sync::<OneshotSender<T>>();
        }

        test::<usize>();
        test::<UnsafeCell<usize>>();
    }

    #[test]
    fn test_send_then_recv() {
        let (tx, rx) = channel::<usize>();
        assert!(rx.is_pending());
        assert!(tx.is_pending());
        tx.send(1).unwrap();
        assert!(!rx.is_pending());
        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn test_recv_from_other_thread() {
        let (tx, rx) = channel::<&str>();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send("done").unwrap();
        });
        assert_eq!(rx.recv(), Some("done"));
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, rx) = channel::<usize>();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            tx.send(7).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Err(Timeout));
        assert!(rx.is_pending());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Some(7)));
        worker.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_closes() {
        let (tx, rx) = channel::<usize>();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(tx);
        });
        assert_eq!(rx.recv(), None);
        assert!(!rx.is_pending());
    }

    #[test]
    fn test_close_rejects_late_send() {
        let (tx, rx) = channel::<usize>();
        assert!(rx.close());
        assert!(!tx.is_pending());
        assert_eq!(tx.send(3), Err(3));
        assert_eq!(rx.try_recv(), Ok(None));
        assert!(!rx.close());
    }

    #[test]
    fn test_close_after_send_keeps_value() {
        let (tx, rx) = channel::<usize>();
        tx.send(5).unwrap();
        assert!(!rx.close());
        assert_eq!(rx.try_recv(), Ok(Some(5)));
    }

    #[test]
    fn test_ready_receiver() {
        let rx = ready(11);
        assert!(!rx.is_pending());
        assert_eq!(rx.try_recv(), Ok(Some(11)));
    }
}
