//! Turns a finished monitor into a severity-graded report.

use unblock_types::{aggregate, significant, Microseconds, Report, Severity};

use crate::config::MonitorConfig;
use crate::monitor::Monitor;

/// Grades and formats monitors according to the configured policy.
#[derive(Debug, Clone)]
pub struct Reporter {
    error_block_count: Option<u64>,
    min_entry: Microseconds,
    verbose: bool,
}

impl Reporter {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            error_block_count: config.error_block_count,
            min_entry: config.min_entry(),
            verbose: config.verbose,
        }
    }

    /// Force the per-site breakdown regardless of severity.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Severity for a scope's totals.
    ///
    /// `Info` while the blocked total is at or under the deadline, `Warning`
    /// once it is strictly over. With an escalation count configured, a scope
    /// over the deadline that also blocked more than that many times is an
    /// `Error`.
    pub fn severity(
        &self,
        total_calls: u64,
        blocked_calls: u64,
        total_blocked: Microseconds,
        deadline: Microseconds,
    ) -> Severity {
        if total_calls == 0 {
            return Severity::Debug;
        }
        if total_blocked <= deadline {
            return Severity::Info;
        }
        match self.error_block_count {
            Some(limit) if blocked_calls > limit => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Build the report for a monitor.
    pub fn report(&self, monitor: &Monitor) -> Report {
        let deadline = Microseconds::from(monitor.deadline());
        let builder = Report::builder(monitor.description()).deadline(deadline);

        if monitor.total_calls() == 0 {
            return builder.severity(Severity::Debug).build();
        }

        let events = monitor.events();
        let blocked_calls = events.len() as u64;
        let total_blocked = monitor.total_blocked();
        let severity = self.severity(monitor.total_calls(), blocked_calls, total_blocked, deadline);

        let builder = builder
            .calls(monitor.total_calls(), blocked_calls)
            .ignored(monitor.ignored_calls())
            .total_blocked(total_blocked)
            .severity(severity);

        if events.is_empty() {
            builder.build()
        } else if self.verbose {
            builder.entries(aggregate(events)).build()
        } else if severity > Severity::Info {
            builder.entries(significant(aggregate(events), self.min_entry)).build()
        } else {
            builder.elided().build()
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}
