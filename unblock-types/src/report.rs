//! Report - the outcome of monitoring one unit of work.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::{AggregatedEntry, Microseconds, SchemaVersion, Severity};

/// Whether the per-site breakdown is part of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum Detail {
    /// Nothing blocked, so there is nothing to break down.
    #[default]
    #[cfg_attr(feature = "minicbor", n(0))]
    None,
    /// Entries are listed.
    #[cfg_attr(feature = "minicbor", n(1))]
    Included,
    /// Something blocked, but the breakdown needs verbose diagnostics.
    #[cfg_attr(feature = "minicbor", n(2))]
    Elided,
}

/// Blocking statistics and ranked blocking sites for one scope.
///
/// # Example
///
/// ```rust
/// use unblock_types::{Detail, Microseconds, Report, Severity};
///
/// let report = Report::builder("/api/orders")
///     .timestamp_ms(1703160000000)
///     .calls(4, 3)
///     .total_blocked(Microseconds::from_millis(150))
///     .deadline(Microseconds::from_millis(100))
///     .severity(Severity::Warning)
///     .build();
///
/// assert_eq!(report.blocked_percent(), 75);
/// assert_eq!(report.detail, Detail::None);
/// assert!(report.to_string().starts_with("3 of 4 (75%) async calls blocked"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct Report {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when the scope ended.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// Label of the unit of work, e.g. a request path or job name.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub description: String,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub severity: Severity,

    /// Every retrieval observed, blocking or not.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub total_calls: u64,

    /// Retrievals that blocked while monitoring was enabled.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub blocked_calls: u64,

    /// Retrievals that blocked while monitoring was disabled.
    #[cfg_attr(feature = "minicbor", n(6))]
    pub ignored_calls: u64,

    /// Summed wait across all blocked retrievals.
    #[cfg_attr(feature = "minicbor", n(7))]
    pub total_blocked: Microseconds,

    /// The deadline the total was judged against.
    #[cfg_attr(feature = "minicbor", n(8))]
    pub deadline: Microseconds,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(9))]
    pub detail: Detail,

    /// Ranked blocking sites; empty unless `detail` is `Included`.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    #[cfg_attr(feature = "minicbor", n(10))]
    pub entries: Vec<AggregatedEntry>,
}

impl Report {
    /// Create a builder for a scope with the given description.
    pub fn builder(description: impl Into<String>) -> ReportBuilder {
        ReportBuilder::new(description)
    }

    /// Fraction of retrievals that blocked, `0.0` when nothing was observed.
    pub fn block_ratio(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.blocked_calls as f64 / self.total_calls as f64
        }
    }

    /// Integer percentage of retrievals that blocked.
    pub fn blocked_percent(&self) -> u64 {
        if self.total_calls == 0 {
            0
        } else {
            100 * self.blocked_calls / self.total_calls
        }
    }

    /// True when no retrieval was observed at all.
    pub fn is_idle(&self) -> bool {
        self.total_calls == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            return write!(f, "No asynchronous calls were intercepted in '{}'.", self.description);
        }

        write!(
            f,
            "{} of {} ({}%) async calls blocked for {} in '{}' (deadline {}).",
            self.blocked_calls,
            self.total_calls,
            self.blocked_percent(),
            self.total_blocked,
            self.description,
            self.deadline,
        )?;
        if self.ignored_calls > 0 {
            write!(f, " Ignored {} blocking calls.", self.ignored_calls)?;
        }

        match self.detail {
            Detail::None => Ok(()),
            Detail::Elided => {
                f.write_str(" Enable DEBUG logging for target `unblock` to see stack traces.")
            }
            Detail::Included => {
                for entry in &self.entries {
                    let times = if entry.occurrences == 1 { "time" } else { "times" };
                    write!(
                        f,
                        "\nResult of {} blocked {} {} for {}",
                        entry.call_site, entry.occurrences, times, entry.total_duration
                    )?;
                    for frame in entry.fingerprint.frames() {
                        write!(f, "\n\tat {}", frame)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Builder for constructing `Report` instances.
#[derive(Debug)]
pub struct ReportBuilder {
    description: String,
    timestamp_ms: Option<u64>,
    severity: Severity,
    total_calls: u64,
    blocked_calls: u64,
    ignored_calls: u64,
    total_blocked: Microseconds,
    deadline: Microseconds,
    detail: Detail,
    entries: Vec<AggregatedEntry>,
}

impl ReportBuilder {
    /// Create a new builder.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            timestamp_ms: None,
            severity: Severity::Info,
            total_calls: 0,
            blocked_calls: 0,
            ignored_calls: 0,
            total_blocked: Microseconds::ZERO,
            deadline: Microseconds::ZERO,
            detail: Detail::None,
            entries: Vec::new(),
        }
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Set total and blocked retrieval counts.
    pub fn calls(mut self, total: u64, blocked: u64) -> Self {
        self.total_calls = total;
        self.blocked_calls = blocked;
        self
    }

    /// Set the number of blocking retrievals seen while disabled.
    pub fn ignored(mut self, ignored: u64) -> Self {
        self.ignored_calls = ignored;
        self
    }

    pub fn total_blocked(mut self, total: Microseconds) -> Self {
        self.total_blocked = total;
        self
    }

    pub fn deadline(mut self, deadline: Microseconds) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach the ranked breakdown and mark it as included.
    pub fn entries(mut self, entries: Vec<AggregatedEntry>) -> Self {
        self.entries = entries;
        self.detail = Detail::Included;
        self
    }

    /// Note that a breakdown exists but was not attached.
    pub fn elided(mut self) -> Self {
        self.entries.clear();
        self.detail = Detail::Elided;
        self
    }

    /// Build the report.
    #[cfg(feature = "std")]
    pub fn build(self) -> Report {
        let ts = self.timestamp_ms.unwrap_or_else(current_timestamp_ms);
        self.finish(ts)
    }

    /// Build the report with a specific timestamp (for no_std).
    #[cfg(not(feature = "std"))]
    pub fn build(self) -> Report {
        let ts = self.timestamp_ms.unwrap_or(0);
        self.finish(ts)
    }

    fn finish(self, timestamp_ms: u64) -> Report {
        Report {
            version: SchemaVersion::current(),
            timestamp_ms,
            description: self.description,
            severity: self.severity,
            total_calls: self.total_calls,
            blocked_calls: self.blocked_calls,
            ignored_calls: self.ignored_calls,
            total_blocked: self.total_blocked,
            deadline: self.deadline,
            detail: self.detail,
            entries: self.entries,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
