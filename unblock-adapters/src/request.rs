//! Binding a monitor to the lifetime of an inbound request.

use std::future::Future;

use tracing::{debug_span, Instrument};
use unblock_sdk::{ScopeRegistry, Unblock, LOG_TARGET};

/// Runs request handlers inside a monitored scope.
///
/// The scope is labelled with the request identifier (typically the path),
/// begins before the handler runs and ends after it returns, fails or
/// panics. For async handlers it also ends when the handler future is
/// dropped before completion.
///
/// # Example
///
/// ```rust
/// use unblock_adapters::RequestMonitor;
/// use unblock_sdk::{AsyncResult, Promise, Unblock};
///
/// let requests = RequestMonitor::new(Unblock::default());
/// let body = requests.dispatch("/api/users/7", |registry| {
///     let user = registry.instrument("users.Get", Promise::<String>::ready("ada".into()));
///     user.get()
/// });
/// assert_eq!(body.unwrap(), "ada");
/// ```
#[derive(Debug, Clone)]
pub struct RequestMonitor {
    unblock: Unblock,
}

impl RequestMonitor {
    pub fn new(unblock: Unblock) -> Self {
        Self { unblock }
    }

    /// Monitor requests with the process-wide settings.
    pub fn global() -> Self {
        Self::new(Unblock::global().clone())
    }

    /// Run a synchronous handler inside a scope named `request_id`.
    pub fn dispatch<T>(&self, request_id: &str, handler: impl FnOnce(&ScopeRegistry) -> T) -> T {
        let _span = debug_span!(target: LOG_TARGET, "request", request_id).entered();
        let scope = self.unblock.scope(request_id);
        handler(scope.registry())
    }

    /// Run an async handler inside a scope named `request_id`.
    pub async fn dispatch_async<F, Fut, T>(&self, request_id: &str, handler: F) -> T
    where
        F: FnOnce(ScopeRegistry) -> Fut,
        Fut: Future<Output = T>,
    {
        let span = debug_span!(target: LOG_TARGET, "request", request_id);
        let scope = self.unblock.scope(request_id);
        let output = handler(scope.registry().clone()).instrument(span).await;
        drop(scope);
        output
    }

    pub fn unblock(&self) -> &Unblock {
        &self.unblock
    }
}

impl Default for RequestMonitor {
    fn default() -> Self {
        Self::global()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use unblock_sdk::{AsyncResult, Output, Promise, Report, Severity};

    fn monitor() -> (RequestMonitor, Arc<Mutex<Vec<Report>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let unblock = Unblock::builder()
            .deadline(Duration::from_millis(1))
            .output(Output::callback(move |r| sink.lock().push(r.clone())))
            .build();
        (RequestMonitor::new(unblock), reports)
    }

    #[test]
    fn test_dispatch_reports_once_per_request() {
        let (requests, reports) = monitor();
        for path in ["/a", "/b"] {
            let value = requests.dispatch(path, |registry| {
                registry.instrument("cache.Get", Promise::<u8>::ready(1)).get()
            });
            assert_eq!(value, Ok(1));
        }

        let reports = reports.lock();
        let descriptions: Vec<_> = reports.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, ["/a", "/b"]);
        assert!(reports.iter().all(|r| r.total_calls == 1 && r.severity == Severity::Info));
    }

    #[test]
    fn test_failed_handlers_are_still_reported() {
        let (requests, reports) = monitor();
        let result: Result<(), &str> = requests.dispatch("/broken", |_| Err("boom"));
        assert!(result.is_err());
        assert_eq!(reports.lock().len(), 1);
    }

    #[test]
    fn test_panicking_handlers_are_still_reported() {
        let (requests, reports) = monitor();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            requests.dispatch("/panics", |_| panic!("handler bug"));
        }));
        assert!(outcome.is_err());
        assert_eq!(reports.lock()[0].description, "/panics");
    }

    #[tokio::test]
    async fn test_async_dispatch_covers_the_handler() {
        let (requests, reports) = monitor();
        let value = requests
            .dispatch_async("/async", |registry| async move {
                let slow = async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    7
                };
                ScopeRegistry::instrument(&registry, "rpc.Call", slow).await
            })
            .await;
        assert_eq!(value, 7);

        let report = reports.lock()[0].clone();
        assert_eq!(report.description, "/async");
        assert_eq!(report.blocked_calls, 1);
        assert_eq!(report.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_cancelled_async_dispatch_ends_the_scope() {
        let (requests, reports) = monitor();
        let handler = requests.dispatch_async("/cancelled", |registry| async move {
            ScopeRegistry::instrument(&registry, "rpc.Call", std::future::pending::<()>()).await
        });
        assert!(tokio::time::timeout(Duration::from_millis(5), handler).await.is_err());

        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].blocked_calls, 1);
    }
}
