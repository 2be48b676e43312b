//! Per-scope blocking state.

use std::time::Duration;

use unblock_types::{BlockEvent, Microseconds};

/// What a single retrieval turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The result was already available.
    Ready,
    /// The retrieval blocked while monitoring was disabled.
    Ignored,
    /// The retrieval blocked and should be timed.
    Blocking,
}

/// Counters and raw events for one unit of work.
///
/// A monitor is created when a scope begins, mutated only through the scope's
/// registry, and consumed by the reporter when the scope ends.
#[derive(Debug, Clone)]
pub struct Monitor {
    id: u64,
    description: String,
    deadline: Duration,
    total_calls: u64,
    ignored: u64,
    disabled: bool,
    events: Vec<BlockEvent>,
}

impl Monitor {
    /// Create a monitor with no observations.
    pub fn new(id: u64, description: impl Into<String>, deadline: Duration) -> Self {
        Self {
            id,
            description: description.into(),
            deadline,
            total_calls: 0,
            ignored: 0,
            disabled: false,
            events: Vec::new(),
        }
    }

    /// Count one retrieval and classify it.
    ///
    /// Every retrieval counts toward the total. A retrieval that was not
    /// ready counts as ignored while disabled and as blocking otherwise;
    /// blocking retrievals are appended later via [`Monitor::push_event`]
    /// once their duration is known.
    pub fn record_access(&mut self, done: bool) -> Access {
        self.total_calls += 1;
        if done {
            Access::Ready
        } else if self.disabled {
            self.ignored += 1;
            Access::Ignored
        } else {
            Access::Blocking
        }
    }

    pub fn push_event(&mut self, event: BlockEvent) {
        self.events.push(event);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Duration) {
        self.deadline = deadline;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Set the disabled flag, returning its previous value.
    pub fn set_disabled(&mut self, disabled: bool) -> bool {
        std::mem::replace(&mut self.disabled, disabled)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn ignored_calls(&self) -> u64 {
        self.ignored
    }

    /// Raw events in the order they finished.
    pub fn events(&self) -> &[BlockEvent] {
        &self.events
    }

    /// Summed duration of all recorded events.
    pub fn total_blocked(&self) -> Microseconds {
        self.events.iter().map(|e| e.duration).sum()
    }

    /// A copy of the counters, without the raw events.
    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            description: self.description.clone(),
            deadline: self.deadline,
            total_calls: self.total_calls,
            blocked_calls: self.events.len() as u64,
            ignored_calls: self.ignored,
            disabled: self.disabled,
            total_blocked: self.total_blocked(),
        }
    }
}

/// Point-in-time counters of an active scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStats {
    pub description: String,
    pub deadline: Duration,
    pub total_calls: u64,
    pub blocked_calls: u64,
    pub ignored_calls: u64,
    pub disabled: bool,
    pub total_blocked: Microseconds,
}

#[cfg(test)]
mod tests {
    use super::*;
    use unblock_types::StackFingerprint;

    #[test]
    fn test_ready_access_only_counts() {
        let mut monitor = Monitor::new(1, "/x", Duration::from_millis(500));
        assert_eq!(monitor.record_access(true), Access::Ready);
        assert_eq!(monitor.total_calls(), 1);
        assert_eq!(monitor.ignored_calls(), 0);
        assert!(monitor.events().is_empty());
    }

    #[test]
    fn test_disabled_blocking_is_ignored() {
        let mut monitor = Monitor::new(1, "/x", Duration::from_millis(500));
        monitor.set_disabled(true);
        assert_eq!(monitor.record_access(false), Access::Ignored);
        assert_eq!(monitor.record_access(true), Access::Ready);
        assert_eq!(monitor.total_calls(), 2);
        assert_eq!(monitor.ignored_calls(), 1);
    }

    #[test]
    fn test_enabled_blocking_is_timed() {
        let mut monitor = Monitor::new(1, "/x", Duration::from_millis(500));
        assert_eq!(monitor.record_access(false), Access::Blocking);
        monitor.push_event(BlockEvent::new(
            "db.get",
            StackFingerprint::default(),
            0,
            Microseconds::from_millis(12),
        ));
        let stats = monitor.stats();
        assert_eq!(stats.blocked_calls, 1);
        assert_eq!(stats.total_blocked, Microseconds::from_millis(12));
    }

    #[test]
    fn test_set_disabled_returns_previous() {
        let mut monitor = Monitor::new(1, "/x", Duration::ZERO);
        assert!(!monitor.set_disabled(true));
        assert!(monitor.set_disabled(true));
        assert!(monitor.set_disabled(false));
        assert!(!monitor.is_disabled());
    }
}
