//! # unblock-cli
//!
//! Offline analysis of the reports written by `unblock_sdk::Output::file`.
//! Each line of the input is one serialized report; the roll-up merges them
//! so the call sites that block most across many requests are listed first.
//!
//! ```rust
//! use std::io::Cursor;
//! use unblock_cli::{rollup, source};
//!
//! let input = r#"{"version":{"major":1,"minor":0},"timestamp_ms":0,"description":"/feed","severity":"warning","total_calls":3,"blocked_calls":2,"ignored_calls":0,"total_blocked":900000,"deadline":500000,"detail":"elided","entries":[]}"#;
//! let loaded = source::read(Cursor::new(input)).unwrap();
//! let rollup = rollup::rollup(&loaded.reports, &rollup::Filter::default());
//! assert_eq!(rollup.reports, 1);
//! assert_eq!(rollup.without_detail, 1);
//! ```

pub mod duration;
pub mod render;
pub mod rollup;
pub mod settings;
pub mod source;
