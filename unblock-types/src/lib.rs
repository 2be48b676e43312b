//! # unblock-types
//!
//! Core types for reporting blocking accesses to asynchronous results. This
//! crate defines the data model shared by the runtime monitor, the report
//! sinks and any tool that consumes reports after the fact.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Pure aggregation**: Grouping and ranking of blocking sites is a plain function
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **Versioned schema**: Reports include version info for forward compatibility
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use unblock_types::{aggregate, BlockEvent, FrameFilter, Microseconds, StackFingerprint};
//!
//! let filter = FrameFilter::default();
//! let stack = ["unblock_sdk::handle::wait", "my_app::orders::load (src/orders.rs:42)"];
//! let fingerprint = StackFingerprint::from_frames(stack, &filter);
//!
//! let events = vec![
//!     BlockEvent::new("datastore.get", fingerprint.clone(), 0, Microseconds::from_millis(40)),
//!     BlockEvent::new("datastore.get", fingerprint, 0, Microseconds::from_millis(60)),
//! ];
//!
//! let entries = aggregate(&events);
//! assert_eq!(entries.len(), 1);
//! assert_eq!(entries[0].occurrences, 2);
//! assert_eq!(entries[0].total_duration, Microseconds::from_millis(100));
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. The version is included in serialized
//! reports to allow consumers to handle format evolution gracefully.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod aggregate;
mod duration;
mod event;
mod fingerprint;
mod report;
mod severity;
mod version;

pub use aggregate::*;
pub use duration::*;
pub use event::*;
pub use fingerprint::*;
pub use report::*;
pub use severity::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the report format.
/// Consumers should check this version and handle older formats appropriately.
pub const SCHEMA_VERSION: u32 = 1;
