//! Result handles and their instrumented wrapper.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::registry::{BlockTimer, ScopeRegistry};

/// A computation whose result may not be available yet.
///
/// Retrieval is synchronous: `get` waits for as long as it takes,
/// `get_timeout` gives up after `timeout`. Every retrieval is independent, so
/// a handle may be read more than once.
pub trait AsyncResult {
    /// The value the computation produces.
    type Output;

    /// How the computation or the wait can fail.
    type Error;

    /// Whether the result can be retrieved without waiting.
    fn is_done(&self) -> bool;

    /// Wait for the result.
    fn get(&self) -> Result<Self::Output, Self::Error>;

    /// Wait for the result, at most for `timeout`.
    fn get_timeout(&self, timeout: Duration) -> Result<Self::Output, Self::Error>;

    /// Try to cancel the computation. Returns `true` if it was cancelled.
    fn cancel(&self) -> bool {
        false
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A result handle whose retrievals are observed by a [`ScopeRegistry`].
///
/// The wrapper is transparent: results, failures, timeouts and cancellation
/// pass through unchanged. When a retrieval finds the result not yet done and
/// monitoring is enabled, the time spent waiting is recorded against the
/// call site.
///
/// Wrapping a [`Future`] yields a future. Awaiting it counts as one
/// retrieval: it blocks if the first poll is pending, and the block ends when
/// the future resolves or is dropped unresolved.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use unblock_sdk::{AsyncResult, Promise, Unblock};
///
/// let registry = Unblock::new(Default::default()).registry();
/// let scope = registry.begin("job:reindex").unwrap();
///
/// let (promise, completer) = Promise::<&str>::new();
/// let handle = registry.instrument("search.Index", promise);
/// std::thread::spawn(move || {
///     std::thread::sleep(Duration::from_millis(5));
///     completer.complete("ok");
/// });
/// assert_eq!(handle.get(), Ok("ok"));
///
/// let report = scope.finish().unwrap();
/// assert_eq!(report.blocked_calls, 1);
/// ```
pub struct InstrumentedHandle<H> {
    inner: H,
    call_site: String,
    registry: ScopeRegistry,
    timer: Option<BlockTimer>,
    polled: bool,
}

impl<H> InstrumentedHandle<H> {
    /// Wrap `inner`, attributing blocking to `call_site`.
    pub fn new(inner: H, call_site: impl Into<String>, registry: ScopeRegistry) -> Self {
        Self {
            inner,
            call_site: call_site.into(),
            registry,
            timer: None,
            polled: false,
        }
    }

    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Unwrap the handle. Later retrievals are no longer observed.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: AsyncResult> AsyncResult for InstrumentedHandle<H> {
    type Output = H::Output;
    type Error = H::Error;

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn get(&self) -> Result<H::Output, H::Error> {
        let _timer = self.registry.observe(&self.call_site, self.inner.is_done());
        self.inner.get()
    }

    fn get_timeout(&self, timeout: Duration) -> Result<H::Output, H::Error> {
        let _timer = self.registry.observe(&self.call_site, self.inner.is_done());
        self.inner.get_timeout(timeout)
    }

    fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl<F: Future> Future for InstrumentedHandle<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        // SAFETY: `inner` is structurally pinned. It is only ever accessed
        // through this projection while pinned, the wrapper has no `Drop`
        // impl, and `Unpin` is only derived when `F: Unpin`. The remaining
        // fields are never pinned.
        let this = unsafe { self.get_unchecked_mut() };
        let inner = unsafe { Pin::new_unchecked(&mut this.inner) };

        let poll = inner.poll(cx);
        if !this.polled {
            this.polled = true;
            this.timer = this.registry.observe(&this.call_site, poll.is_ready());
        }
        if poll.is_ready() {
            this.timer = None;
        }
        poll
    }
}

impl<H: Clone> Clone for InstrumentedHandle<H> {
    /// The clone shares the registry but starts with no retrieval in flight.
    fn clone(&self) -> Self {
        Self::new(self.inner.clone(), self.call_site.clone(), self.registry.clone())
    }
}

impl<H> fmt::Debug for InstrumentedHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedHandle")
            .field("call_site", &self.call_site)
            .field("blocking", &self.timer.is_some())
            .finish()
    }
}
