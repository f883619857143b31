//! A deferred result: either a value or the failure that prevented it.

use std::panic::AssertUnwindSafe;

use cutils_common::{Error, Result, error::panic_message};

/// Holds the outcome of a computation that has already run, to be inspected
/// by the caller.
///
/// `Try` is a thin wrapper over [`Result`] with combinators for the
/// inspect-then-consume style a [`Runner`](crate::task_group::Runner) hands
/// out. It converts freely to and from `Result`.
#[derive(Debug)]
#[must_use]
pub struct Try<T>(Result<T>);

impl<T> Try<T> {
    pub fn success(value: T) -> Try<T> {
        Try(Ok(value))
    }

    pub fn failure(error: Error) -> Try<T> {
        Try(Err(error))
    }

    /// Runs `f`, capturing both its error and a panic as a failure.
    pub fn of<F>(f: F) -> Try<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(res) => Try(res),
            Err(payload) => Try::failure(Error::job_panicked(panic_message(payload.as_ref()))),
        }
    }

    pub fn is_success(&self) -> bool {
        self.0.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.0.is_err()
    }

    pub fn as_result(&self) -> std::result::Result<&T, &Error> {
        self.0.as_ref()
    }

    pub fn as_mut_result(&mut self) -> std::result::Result<&mut T, &mut Error> {
        self.0.as_mut()
    }

    /// Consumes the `Try`, returning the value or the failure.
    pub fn get(self) -> Result<T> {
        self.0
    }

    pub fn ok(self) -> Option<T> {
        self.0.ok()
    }

    pub fn err(self) -> Option<Error> {
        self.0.err()
    }

    pub fn map<U, F>(self, f: F) -> Try<U>
    where
        F: FnOnce(T) -> U,
    {
        Try(self.0.map(f))
    }

    pub fn and_then<U, F>(self, f: F) -> Try<U>
    where
        F: FnOnce(T) -> Result<U>,
    {
        Try(self.0.and_then(f))
    }

    pub fn map_err<F>(self, f: F) -> Try<T>
    where
        F: FnOnce(Error) -> Error,
    {
        Try(self.0.map_err(f))
    }

    /// Turns a failure back into a value, or into a different failure.
    pub fn recover<F>(self, f: F) -> Try<T>
    where
        F: FnOnce(Error) -> Result<T>,
    {
        Try(self.0.or_else(f))
    }

    pub fn on_success<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&T),
    {
        if let Ok(value) = &self.0 {
            f(value);
        }
        self
    }

    pub fn on_failure<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Error),
    {
        if let Err(e) = &self.0 {
            f(e);
        }
        self
    }

    pub fn or_else(self, default: T) -> T {
        self.0.unwrap_or(default)
    }

    pub fn or_else_get<F>(self, f: F) -> T
    where
        F: FnOnce(Error) -> T,
    {
        self.0.unwrap_or_else(f)
    }

    pub fn into_result(self) -> Result<T> {
        self.0
    }
}

impl<T> From<Result<T>> for Try<T> {
    fn from(res: Result<T>) -> Self {
        Try(res)
    }
}

impl<T> From<Try<T>> for Result<T> {
    fn from(t: Try<T>) -> Self {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutils_common::error::ErrorKind;
    use std::cell::Cell;

    #[test]
    fn test_of_captures_error_and_panic() {
        assert_eq!(Try::of(|| Ok(2)).get().unwrap(), 2);

        let failed: Try<u8> = Try::of(|| Err(Error::invalid_operation("read")));
        assert!(failed.is_failure());

        let panicked: Try<u8> = Try::of(|| panic!("lost"));
        match panicked.err().unwrap().into_kind() {
            ErrorKind::JobPanicked { message } => assert_eq!(message, "lost"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_callbacks_fire_on_matching_side() {
        let hits = Cell::new(0);
        Try::success(1)
            .on_success(|v| hits.set(hits.get() + *v))
            .on_failure(|_| hits.set(100));
        assert_eq!(hits.get(), 1);

        Try::<u8>::failure(Error::cancelled())
            .on_success(|_| hits.set(100))
            .on_failure(|e| {
                assert!(e.is_cancelled());
                hits.set(hits.get() + 10);
            });
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_combinators() {
        let doubled = Try::success(4).map(|v| v * 2);
        assert_eq!(doubled.as_result().ok(), Some(&8));

        let chained: Try<u32> = Try::success(3).and_then(|_| Err(Error::cancelled()));
        assert!(chained.is_failure());

        let recovered = chained.recover(|e| if e.is_cancelled() { Ok(0) } else { Err(e) });
        assert_eq!(recovered.ok(), Some(0));

        let relabeled: Try<u8> =
            Try::failure(Error::cancelled()).map_err(|_| Error::rejected("pool closed"));
        assert_eq!(relabeled.err().unwrap().to_string(), "task rejected: pool closed");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Try::<u8>::failure(Error::cancelled()).or_else(7), 7);
        assert_eq!(Try::success(1).or_else(7), 1);
        assert_eq!(
            Try::<String>::failure(Error::rejected("x")).or_else_get(|e| e.to_string()),
            "task rejected: x"
        );
    }

    #[test]
    fn test_result_conversions() {
        let t: Try<u8> = Ok(5).into();
        let r: Result<u8> = t.into();
        assert_eq!(r.unwrap(), 5);
        let mut t = Try::success(vec![1]);
        if let Ok(v) = t.as_mut_result() {
            v.push(2);
        }
        assert_eq!(t.into_result().unwrap(), vec![1, 2]);
    }
}
