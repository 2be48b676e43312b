//! Interception of an RPC delegate.
//!
//! A [`ServiceDelegate`] is the single choke point through which an
//! application talks to its backend services. Wrapping it in a
//! [`MonitoredDelegate`] instruments every asynchronous call without touching
//! the calling code.

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use unblock_sdk::{AsyncResult, InstrumentedHandle, ScopeRegistry};
use unblock_types::Severity;

use crate::error::AdapterError;

/// Per-call options passed through to the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallConfig {
    /// How long the service may take, if bounded.
    pub deadline: Option<Duration>,
}

/// A log line forwarded to the service's log collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: Severity,
    pub timestamp_ms: u64,
    pub message: String,
}

/// The operations an application performs against its backend services.
///
/// Calls are addressed by `package` and `method`; payloads are opaque bytes.
pub trait ServiceDelegate {
    /// Per-request environment, e.g. credentials or the calling app id.
    type Env;

    /// Handle for the result of an asynchronous call.
    type Handle: AsyncResult<Output = Vec<u8>>;

    /// Start a call and return immediately.
    fn make_async_call(
        &self,
        env: &Self::Env,
        package: &str,
        method: &str,
        request: &[u8],
        config: &CallConfig,
    ) -> Self::Handle;

    /// Perform a call and wait for its result.
    fn make_sync_call(
        &self,
        env: &Self::Env,
        package: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>, AdapterError>;

    fn log(&self, env: &Self::Env, record: LogRecord);

    fn flush_logs(&self, env: &Self::Env);

    /// Threads currently serving the request.
    fn request_threads(&self, env: &Self::Env) -> Vec<ThreadId>;
}

macro_rules! forward_delegate {
    ($($ptr:ty),+) => {$(
        impl<D: ServiceDelegate + ?Sized> ServiceDelegate for $ptr {
            type Env = D::Env;
            type Handle = D::Handle;

            fn make_async_call(
                &self,
                env: &D::Env,
                package: &str,
                method: &str,
                request: &[u8],
                config: &CallConfig,
            ) -> D::Handle {
                (**self).make_async_call(env, package, method, request, config)
            }

            fn make_sync_call(
                &self,
                env: &D::Env,
                package: &str,
                method: &str,
                request: &[u8],
            ) -> Result<Vec<u8>, AdapterError> {
                (**self).make_sync_call(env, package, method, request)
            }

            fn log(&self, env: &D::Env, record: LogRecord) {
                (**self).log(env, record)
            }

            fn flush_logs(&self, env: &D::Env) {
                (**self).flush_logs(env)
            }

            fn request_threads(&self, env: &D::Env) -> Vec<ThreadId> {
                (**self).request_threads(env)
            }
        }
    )+};
}

forward_delegate!(&D, Box<D>, Arc<D>);

/// A delegate whose asynchronous results are observed by a registry.
///
/// Every handle returned by [`ServiceDelegate::make_async_call`] is wrapped
/// in an [`InstrumentedHandle`] labelled `package.method`. Logging and thread
/// queries go straight to the wrapped delegate. Synchronous calls are made
/// asynchronously and waited on at once, so they show up as blocking.
///
/// The wrapped delegate is usually shared across requests while the registry
/// belongs to one request; wrap a reference per request:
///
/// ```rust,ignore
/// let monitored = MonitoredDelegate::new(&shared_delegate, scope.registry().clone());
/// ```
#[derive(Debug, Clone)]
pub struct MonitoredDelegate<D> {
    delegate: D,
    registry: ScopeRegistry,
}

impl<D> MonitoredDelegate<D> {
    pub fn new(delegate: D, registry: ScopeRegistry) -> Self {
        Self { delegate, registry }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn inner(&self) -> &D {
        &self.delegate
    }

    pub fn into_inner(self) -> D {
        self.delegate
    }
}

/// Label used for calls to `method` of `package`.
pub fn call_site(package: &str, method: &str) -> String {
    format!("{package}.{method}")
}

impl<D> ServiceDelegate for MonitoredDelegate<D>
where
    D: ServiceDelegate,
    <D::Handle as AsyncResult>::Error: Into<AdapterError>,
{
    type Env = D::Env;
    type Handle = InstrumentedHandle<D::Handle>;

    fn make_async_call(
        &self,
        env: &D::Env,
        package: &str,
        method: &str,
        request: &[u8],
        config: &CallConfig,
    ) -> Self::Handle {
        let handle = self.delegate.make_async_call(env, package, method, request, config);
        self.registry.instrument(call_site(package, method), handle)
    }

    fn make_sync_call(
        &self,
        env: &D::Env,
        package: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>, AdapterError> {
        self.make_async_call(env, package, method, request, &CallConfig::default())
            .get()
            .map_err(Into::into)
    }

    fn log(&self, env: &D::Env, record: LogRecord) {
        self.delegate.log(env, record)
    }

    fn flush_logs(&self, env: &D::Env) {
        self.delegate.flush_logs(env)
    }

    fn request_threads(&self, env: &D::Env) -> Vec<ThreadId> {
        self.delegate.request_threads(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FakeEnv};
    use unblock_sdk::{Output, Unblock, WaitError};

    fn registry() -> ScopeRegistry {
        Unblock::builder()
            .deadline(Duration::from_millis(1))
            .verbose(true)
            .output(Output::callback(|_| {}))
            .build()
            .registry()
    }

    #[test]
    fn test_async_calls_are_labelled_by_package_and_method() {
        let backend = FakeBackend::with_latency(Duration::from_millis(5));
        let registry = registry();
        let monitored = MonitoredDelegate::new(&backend, registry.clone());

        let scope = registry.begin("/feed").unwrap();
        let config = CallConfig::default();
        let handle = monitored.make_async_call(&FakeEnv, "datastore_v3", "Get", b"key", &config);
        assert_eq!(handle.call_site(), "datastore_v3.Get");
        assert_eq!(handle.get(), Ok(b"key".to_vec()));

        let report = scope.finish().unwrap();
        assert_eq!(report.blocked_calls, 1);
        assert_eq!(report.entries[0].call_site, "datastore_v3.Get");
    }

    #[test]
    fn test_sync_calls_block_on_the_instrumented_handle() {
        let backend = FakeBackend::with_latency(Duration::from_millis(5));
        let registry = registry();
        let monitored = MonitoredDelegate::new(&backend, registry.clone());

        let scope = registry.begin("/feed").unwrap();
        assert_eq!(monitored.make_sync_call(&FakeEnv, "memcache", "Get", b"v"), Ok(b"v".to_vec()));
        assert_eq!(monitored.make_sync_call(&FakeEnv, "memcache", "Get", b"v"), Ok(b"v".to_vec()));

        let report = scope.finish().unwrap();
        assert_eq!(report.total_calls, 2);
        assert_eq!(report.blocked_calls, 2);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].occurrences, 2);
    }

    #[test]
    fn test_sync_call_failures_are_mapped() {
        let backend = FakeBackend::failing();
        let monitored = MonitoredDelegate::new(&backend, registry());
        assert_eq!(
            monitored.make_sync_call(&FakeEnv, "urlfetch", "Fetch", b""),
            Err(AdapterError::Wait(WaitError::Abandoned))
        );
    }

    #[test]
    fn test_passthrough_operations_are_forwarded() {
        let backend = FakeBackend::with_latency(Duration::ZERO);
        let registry = registry();
        let monitored = MonitoredDelegate::new(&backend, registry.clone());
        let scope = registry.begin("/feed").unwrap();

        monitored.log(
            &FakeEnv,
            LogRecord {
                level: Severity::Info,
                timestamp_ms: 0,
                message: "hello".into(),
            },
        );
        monitored.flush_logs(&FakeEnv);
        assert_eq!(monitored.request_threads(&FakeEnv), vec![std::thread::current().id()]);

        assert_eq!(backend.logged(), ["hello"]);
        assert_eq!(backend.flushes(), 1);
        assert_eq!(scope.finish().unwrap().total_calls, 0);
    }

    #[test]
    fn test_shared_backends_can_be_wrapped() {
        let backend = Arc::new(FakeBackend::with_latency(Duration::ZERO));
        let monitored = MonitoredDelegate::new(backend.clone(), registry());
        assert_eq!(monitored.make_sync_call(&FakeEnv, "a", "b", b"x"), Ok(b"x".to_vec()));
        assert_eq!(monitored.inner().calls(), 1);
    }

    #[test]
    fn test_call_site_format() {
        assert_eq!(call_site("taskqueue", "Add"), "taskqueue.Add");
    }
}
