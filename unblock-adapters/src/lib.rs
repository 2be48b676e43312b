//! # unblock-adapters
//!
//! Glue between the unblock monitor and the code it watches.
//!
//! - [`MonitoredDelegate`] intercepts an RPC [`ServiceDelegate`] and
//!   instruments every asynchronous call as `package.method`
//! - [`instrument!`] wraps a single handle when writing an adapter by hand
//! - [`RequestMonitor`] ties a monitored scope to an inbound request
//!
//! ## Quick Start
//!
//! ```rust
//! use unblock_adapters::{instrument, RequestMonitor};
//! use unblock_sdk::{AsyncResult, Promise, Unblock};
//!
//! struct Users;
//!
//! impl Users {
//!     fn lookup(&self, id: u32) -> Promise<String> {
//!         Promise::ready(format!("user-{id}"))
//!     }
//! }
//!
//! let users = Users;
//! let requests = RequestMonitor::new(Unblock::default());
//! let name = requests.dispatch("/profile/7", |registry| {
//!     // Labelled "users.lookup".
//!     let user = instrument!(registry, users.lookup(7));
//!     user.get()
//! });
//! assert_eq!(name.unwrap(), "user-7");
//! ```

pub mod delegate;
pub mod error;
pub mod request;

#[cfg(test)]
mod testing;

pub use delegate::{call_site, CallConfig, LogRecord, MonitoredDelegate, ServiceDelegate};
pub use error::AdapterError;
pub use request::RequestMonitor;

// Re-export types for convenience
pub use unblock_sdk::{AsyncResult, InstrumentedHandle, ScopeRegistry};

/// Wrap the handle returned by a service call in an [`InstrumentedHandle`].
///
/// With an explicit label:
///
/// ```rust,ignore
/// let handle = instrument!(registry, "datastore_v3.Get", store.get(key));
/// ```
///
/// For a plain `receiver.method(args)` call the label is derived from the
/// call itself, here `store.get`:
///
/// ```rust,ignore
/// let handle = instrument!(registry, store.get(key));
/// ```
#[macro_export]
macro_rules! instrument {
    ($registry:expr, $call_site:literal, $handle:expr $(,)?) => {
        $crate::ScopeRegistry::instrument(&$registry, $call_site, $handle)
    };
    ($registry:expr, $receiver:ident . $method:ident ( $($arg:expr),* $(,)? ) $(,)?) => {
        $crate::ScopeRegistry::instrument(
            &$registry,
            concat!(stringify!($receiver), ".", stringify!($method)),
            $receiver.$method($($arg),*),
        )
    };
}
