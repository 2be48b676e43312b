//! Report sinks.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use unblock_types::{Report, Severity};

/// Log target used for report records.
pub const LOG_TARGET: &str = "unblock";

/// Where finished reports go.
///
/// Every output receives every report; sink failures are logged and never
/// surface in the monitored application.
#[derive(Clone)]
pub enum Output {
    /// Emit one `tracing` event per report at the report's severity.
    Log,

    /// Append reports to a file as newline-delimited JSON.
    File(PathBuf),

    /// Send reports through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<Report>),

    /// Hand reports to a closure.
    Callback(Arc<dyn Fn(&Report) + Send + Sync>),
}

impl Output {
    /// Create a `tracing` output.
    pub fn log() -> Self {
        Output::Log
    }

    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use unblock_sdk::Output;
    ///
    /// let output = Output::file("unblock-reports.jsonl");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Sends never block: when the buffer is full the report is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use unblock_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(64);
    ///
    /// // Later, receive reports
    /// // while let Some(report) = rx.recv().await {
    /// //     println!("{}", report);
    /// // }
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<Report>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Create a callback output.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        Output::Callback(Arc::new(f))
    }

    /// Emit a report to this output.
    pub(crate) fn emit(&self, report: &Report) -> std::io::Result<()> {
        match self {
            Output::Log => log_report(report),
            Output::File(path) => {
                let json = serde_json::to_string(report)?;
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{}", json)?;
            }
            #[cfg(feature = "tokio")]
            Output::Channel(tx) => {
                // Best effort send (don't block if channel is full)
                let _ = tx.try_send(report.clone());
            }
            Output::Callback(f) => f(report),
        }
        Ok(())
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Log => f.write_str("Log"),
            Output::File(path) => f.debug_tuple("File").field(path).finish(),
            #[cfg(feature = "tokio")]
            Output::Channel(_) => f.write_str("Channel"),
            Output::Callback(_) => f.write_str("Callback"),
        }
    }
}

macro_rules! report_event {
    ($level:ident, $report:expr) => {
        $level!(
            target: LOG_TARGET,
            description = %$report.description,
            total_calls = $report.total_calls,
            blocked_calls = $report.blocked_calls,
            ignored_calls = $report.ignored_calls,
            blocked_percent = $report.blocked_percent(),
            total_blocked_us = $report.total_blocked.as_micros(),
            deadline_us = $report.deadline.as_micros(),
            "{}",
            $report
        )
    };
}

fn log_report(report: &Report) {
    match report.severity {
        Severity::Debug => report_event!(debug, report),
        Severity::Info => report_event!(info, report),
        Severity::Warning => report_event!(warn, report),
        Severity::Error => report_event!(error, report),
    }
}
