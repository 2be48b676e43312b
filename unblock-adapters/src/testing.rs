//! In-memory backend used by the adapter tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use unblock_sdk::{AsyncResult, Promise};

use crate::delegate::{CallConfig, LogRecord, ServiceDelegate};
use crate::error::AdapterError;

pub(crate) struct FakeEnv;

/// Echoes the request back after a fixed latency, or abandons every call.
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    latency: Option<Duration>,
    logged: Mutex<Vec<String>>,
    flushes: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self::default()
    }

    pub(crate) fn logged(&self) -> Vec<String> {
        self.logged.lock().clone()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ServiceDelegate for FakeBackend {
    type Env = FakeEnv;
    type Handle = Promise<Vec<u8>>;

    fn make_async_call(
        &self,
        _env: &FakeEnv,
        _package: &str,
        _method: &str,
        request: &[u8],
        _config: &CallConfig,
    ) -> Promise<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let (promise, completer) = Promise::new();
        if let Some(latency) = self.latency {
            let echo = request.to_vec();
            thread::spawn(move || {
                thread::sleep(latency);
                completer.complete(echo);
            });
        }
        promise
    }

    fn make_sync_call(
        &self,
        env: &FakeEnv,
        package: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>, AdapterError> {
        self.make_async_call(env, package, method, request, &CallConfig::default())
            .get()
            .map_err(Into::into)
    }

    fn log(&self, _env: &FakeEnv, record: LogRecord) {
        self.logged.lock().push(record.message);
    }

    fn flush_logs(&self, _env: &FakeEnv) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    fn request_threads(&self, _env: &FakeEnv) -> Vec<ThreadId> {
        vec![thread::current().id()]
    }
}
