//! Cross-scope roll-up of blocking reports.
//!
//! One report describes one unit of work. Across many requests the same call
//! site tends to block over and over; the roll-up merges per-report entries
//! by `(call_site, fingerprint)` and per-scope totals by description, so the
//! sites worth fixing first float to the top.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;
use unblock_types::{Detail, Microseconds, Report, Severity, StackFingerprint};

/// Example scope descriptions kept per site.
const MAX_EXAMPLES_PER_SITE: usize = 5;

/// Which reports and sites take part in the roll-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Reports below this severity are ignored.
    pub min_severity: Severity,
    /// Sites whose summed wait is below this are dropped.
    pub min_total: Microseconds,
    /// Only scopes whose description contains this text.
    pub description: Option<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
            min_total: Microseconds::ZERO,
            description: None,
        }
    }
}

impl Filter {
    fn accepts(&self, report: &Report) -> bool {
        report.severity >= self.min_severity
            && self
                .description
                .as_deref()
                .map_or(true, |needle| report.description.contains(needle))
    }
}

/// One blocking site merged across every report it appeared in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSummary {
    pub call_site: String,
    pub fingerprint: StackFingerprint,
    pub occurrences: u64,
    pub total_duration: Microseconds,
    /// Number of reports listing this site.
    pub scopes: u64,
    /// A few of the scope descriptions it blocked in, first seen first.
    pub examples: Vec<String>,
}

impl SiteSummary {
    /// Mean wait per blocked retrieval.
    pub fn mean_duration(&self) -> Microseconds {
        match self.occurrences {
            0 => Microseconds::ZERO,
            n => Microseconds::from_micros(self.total_duration.as_micros() / n),
        }
    }
}

/// All reports sharing one description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSummary {
    pub description: String,
    pub reports: u64,
    pub worst: Severity,
    pub total_calls: u64,
    pub blocked_calls: u64,
    pub ignored_calls: u64,
    pub total_blocked: Microseconds,
}

impl ScopeSummary {
    /// Percentage of retrievals that blocked, rounded down.
    pub fn blocked_percent(&self) -> u64 {
        if self.total_calls == 0 {
            0
        } else {
            self.blocked_calls * 100 / self.total_calls
        }
    }
}

/// The ranked result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rollup {
    /// Reports that passed the filter.
    pub reports: usize,
    /// Matching reports that blocked but carried no per-site detail.
    pub without_detail: usize,
    pub sites: Vec<SiteSummary>,
    pub scopes: Vec<ScopeSummary>,
}

impl Rollup {
    /// Keep only the `n` worst sites and scopes.
    pub fn truncate(&mut self, n: usize) {
        self.sites.truncate(n);
        self.scopes.truncate(n);
    }
}

/// Merge `reports` into ranked sites and scopes.
///
/// Sites are ordered by summed wait, then occurrence count, then first
/// appearance; scopes by summed wait, then severity.
pub fn rollup(reports: &[Report], filter: &Filter) -> Rollup {
    let mut result = Rollup::default();
    let mut site_index: BTreeMap<(&str, &StackFingerprint), usize> = BTreeMap::new();
    let mut scope_index: BTreeMap<&str, usize> = BTreeMap::new();

    for report in reports.iter().filter(|r| filter.accepts(r)) {
        result.reports += 1;
        if report.blocked_calls > 0 && report.detail != Detail::Included {
            result.without_detail += 1;
        }

        let slot = *scope_index.entry(report.description.as_str()).or_insert_with(|| {
            result.scopes.push(ScopeSummary {
                description: report.description.clone(),
                reports: 0,
                worst: report.severity,
                total_calls: 0,
                blocked_calls: 0,
                ignored_calls: 0,
                total_blocked: Microseconds::ZERO,
            });
            result.scopes.len() - 1
        });
        let scope = &mut result.scopes[slot];
        scope.reports += 1;
        scope.worst = scope.worst.max(report.severity);
        scope.total_calls += report.total_calls;
        scope.blocked_calls += report.blocked_calls;
        scope.ignored_calls += report.ignored_calls;
        scope.total_blocked += report.total_blocked;

        for entry in &report.entries {
            let slot = *site_index
                .entry((entry.call_site.as_str(), &entry.fingerprint))
                .or_insert_with(|| {
                    result.sites.push(SiteSummary {
                        call_site: entry.call_site.clone(),
                        fingerprint: entry.fingerprint.clone(),
                        occurrences: 0,
                        total_duration: Microseconds::ZERO,
                        scopes: 0,
                        examples: Vec::new(),
                    });
                    result.sites.len() - 1
                });
            let site = &mut result.sites[slot];
            site.occurrences += entry.occurrences;
            site.total_duration += entry.total_duration;
            site.scopes += 1;
            if site.examples.len() < MAX_EXAMPLES_PER_SITE
                && !site.examples.contains(&report.description)
            {
                site.examples.push(report.description.clone());
            }
        }
    }

    result.sites.retain(|s| s.total_duration >= filter.min_total);
    result
        .sites
        .sort_by_key(|s| (Reverse(s.total_duration), Reverse(s.occurrences)));
    result
        .scopes
        .sort_by_key(|s| (Reverse(s.total_blocked), Reverse(s.worst)));
    result
}
