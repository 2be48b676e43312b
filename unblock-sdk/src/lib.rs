//! # unblock-sdk
//!
//! Runtime monitor that finds asynchronous results which were waited on one
//! at a time instead of being overlapped.
//!
//! Each unit of work (a request, a job) carries a [`ScopeRegistry`]. Result
//! handles wrapped by the registry record every retrieval; a retrieval that
//! has to wait is timed and attributed to its call site and stack. When the
//! scope ends the blocking is aggregated per site, graded against the
//! deadline and reported.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use unblock_sdk::{AsyncResult, Output, Promise, Severity, Unblock};
//!
//! let (output, mut reports) = Output::channel(16);
//! let unblock = Unblock::builder()
//!     .deadline(Duration::from_millis(1))
//!     .output(output)
//!     .build();
//!
//! let registry = unblock.registry();
//! let scope = registry.begin("/api/orders").unwrap();
//!
//! for id in 0..3u32 {
//!     // Issued and then immediately waited on: the classic mistake.
//!     let (promise, completer) = Promise::<u32>::new();
//!     std::thread::spawn(move || {
//!         std::thread::sleep(Duration::from_millis(2));
//!         completer.complete(id);
//!     });
//!     let order = registry.instrument("datastore.Get", promise);
//!     assert_eq!(order.get(), Ok(id));
//! }
//!
//! drop(scope);
//! let report = reports.try_recv().unwrap();
//! assert_eq!(report.blocked_calls, 3);
//! assert_eq!(report.severity, Severity::Warning);
//! println!("{report}");
//! ```
//!
//! ## Features
//!
//! - **Explicit context**: no thread-locals; the registry travels with the work
//! - **Sync and async**: wraps [`AsyncResult`] handles and any [`Future`](std::future::Future)
//! - **Deduplicated**: blocking is grouped by call site and stack fingerprint
//! - **Multiple outputs**: `tracing`, JSON-lines file, channel or callback

mod config;
mod error;
mod handle;
mod monitor;
mod output;
mod promise;
mod registry;
mod reporter;
mod stack;
mod unblock;

pub use config::{MonitorConfig, DEFAULT_ERROR_BLOCK_COUNT, ENV_PREFIX};
pub use error::{ConfigError, ScopeError, WaitError};
pub use handle::{AsyncResult, InstrumentedHandle};
pub use monitor::{Access, Monitor, MonitorStats};
pub use output::{Output, LOG_TARGET};
pub use promise::{Completer, Promise};
pub use registry::{ScopeGuard, ScopeRegistry};
pub use reporter::Reporter;
pub use stack::{parse_backtrace, BacktraceCapture, FixedCapture, StackCapture};
pub use unblock::{Unblock, UnblockBuilder};

// Re-export types for convenience
pub use unblock_types::{
    aggregate, AggregatedEntry, BlockEvent, Detail, FrameFilter, Microseconds, Report, Severity,
    StackFingerprint,
};
