//! Call stack capture at the point of a blocking retrieval.

use std::backtrace::Backtrace;
use std::fmt;

/// Source of most-recent-first stack frames.
pub trait StackCapture: Send + Sync + fmt::Debug {
    /// Capture the current call stack as printable frames.
    fn capture(&self) -> Vec<String>;
}

/// Captures the real stack with `std::backtrace`.
///
/// Each frame renders as `symbol (file:line:col)` when debug info is
/// available and as the bare symbol otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceCapture;

impl StackCapture for BacktraceCapture {
    fn capture(&self) -> Vec<String> {
        parse_backtrace(&Backtrace::force_capture().to_string())
    }
}

/// Always returns the same frames. Useful in tests.
#[derive(Debug, Default, Clone)]
pub struct FixedCapture(Vec<String>);

impl FixedCapture {
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(frames.into_iter().map(Into::into).collect())
    }
}

impl StackCapture for FixedCapture {
    fn capture(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Parse the `Display` output of a `Backtrace`.
///
/// ```text
///    4: my_app::handlers::load_feed
///              at ./src/handlers.rs:42:17
///    5: my_app::main
/// ```
pub fn parse_backtrace(text: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                last.push_str(" (");
                last.push_str(location);
                last.push(')');
            }
        } else if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(strip_hash(symbol).to_string());
            }
        }
    }
    frames
}

/// Remove the `::h0123456789abcdef` suffix legacy mangling leaves behind.
fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((path, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            path
        }
        _ => symbol,
    }
}
