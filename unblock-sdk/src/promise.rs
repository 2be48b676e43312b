//! A thread-safe, write-once result handle.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::WaitError;
use crate::handle::AsyncResult;

enum State<T, E> {
    Pending,
    Done(Result<T, E>),
    Cancelled,
    Abandoned,
}

struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    changed: Condvar,
}

impl<T, E> Inner<T, E> {
    /// Move from pending to `next`. Returns false if already settled.
    fn settle(&self, next: State<T, E>) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, State::Pending) {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }
}

/// The reading side of a computation completed elsewhere, usually on another
/// thread.
///
/// Clones observe the same result. Retrieval hands out a clone of the value,
/// so a promise can be read any number of times.
///
/// ```rust
/// use unblock_sdk::{AsyncResult, Promise};
///
/// let (promise, completer) = Promise::<u64>::new();
/// assert!(!promise.is_done());
/// completer.complete(42);
/// assert_eq!(promise.get(), Ok(42));
/// ```
pub struct Promise<T, E = WaitError> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Promise<T, E> {
    /// Create an unsettled promise and the completer that settles it.
    pub fn new() -> (Self, Completer<T, E>) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::Pending),
            changed: Condvar::new(),
        });
        (
            Self { inner: inner.clone() },
            Completer { inner },
        )
    }

    /// A promise that already holds `value`.
    pub fn ready(value: T) -> Self {
        Self::settled(State::Done(Ok(value)))
    }

    /// A promise that already failed with `error`.
    pub fn failed(error: E) -> Self {
        Self::settled(State::Done(Err(error)))
    }

    fn settled(state: State<T, E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
        }
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.inner.state.lock() {
            State::Pending => "pending",
            State::Done(Ok(_)) => "done",
            State::Done(Err(_)) => "failed",
            State::Cancelled => "cancelled",
            State::Abandoned => "abandoned",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone,
    E: Clone + From<WaitError>,
{
    fn take_settled(state: &State<T, E>) -> Option<Result<T, E>> {
        match state {
            State::Pending => None,
            State::Done(result) => Some(result.clone()),
            State::Cancelled => Some(Err(WaitError::Cancelled.into())),
            State::Abandoned => Some(Err(WaitError::Abandoned.into())),
        }
    }
}

impl<T, E> AsyncResult for Promise<T, E>
where
    T: Clone,
    E: Clone + From<WaitError>,
{
    type Output = T;
    type Error = E;

    fn is_done(&self) -> bool {
        !matches!(*self.inner.state.lock(), State::Pending)
    }

    fn get(&self) -> Result<T, E> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = Self::take_settled(&state) {
                return result;
            }
            self.inner.changed.wait(&mut state);
        }
    }

    fn get_timeout(&self, timeout: Duration) -> Result<T, E> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = Self::take_settled(&state) {
                return result;
            }
            if self.inner.changed.wait_until(&mut state, deadline).timed_out() {
                return Self::take_settled(&state).unwrap_or_else(|| Err(WaitError::Timeout.into()));
            }
        }
    }

    fn cancel(&self) -> bool {
        self.inner.settle(State::Cancelled)
    }

    fn is_cancelled(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Cancelled)
    }
}

/// The writing side of a [`Promise`].
///
/// Dropping a completer without settling marks the promise abandoned, so
/// waiters never hang on a producer that went away.
pub struct Completer<T, E = WaitError> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Completer<T, E> {
    /// Settle with a value. Returns false if the promise was cancelled.
    pub fn complete(self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Settle with an error. Returns false if the promise was cancelled.
    pub fn fail(self, error: E) -> bool {
        self.resolve(Err(error))
    }

    pub fn resolve(self, result: Result<T, E>) -> bool {
        self.inner.settle(State::Done(result))
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        self.inner.settle(State::Abandoned);
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}
