//! Grouping of raw block events into ranked blocking sites.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Reverse;

use crate::{BlockEvent, Microseconds, StackFingerprint};

/// All blocking events that share one `(call_site, fingerprint)` identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct AggregatedEntry {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub call_site: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub fingerprint: StackFingerprint,

    /// How many times this site blocked.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub occurrences: u64,

    /// Summed wait across all occurrences.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub total_duration: Microseconds,
}

/// Group events by identity and rank the groups.
///
/// Entries are ordered by total duration (descending), then occurrence count
/// (descending), then by the position of each group's first event, so the
/// output is deterministic for a given input sequence.
pub fn aggregate(events: &[BlockEvent]) -> Vec<AggregatedEntry> {
    let mut index: BTreeMap<(&str, &StackFingerprint), usize> = BTreeMap::new();
    let mut entries: Vec<AggregatedEntry> = Vec::new();

    for event in events {
        let slot = *index.entry(event.identity()).or_insert_with(|| {
            entries.push(AggregatedEntry {
                call_site: event.call_site.clone(),
                fingerprint: event.fingerprint.clone(),
                occurrences: 0,
                total_duration: Microseconds::ZERO,
            });
            entries.len() - 1
        });
        let entry = &mut entries[slot];
        entry.occurrences += 1;
        entry.total_duration += event.duration;
    }

    // Stable sort keeps first-seen order for ties.
    entries.sort_by_key(|e| (Reverse(e.total_duration), Reverse(e.occurrences)));
    entries
}

/// Drop entries whose summed duration is below `min_duration`.
///
/// Used for the printable list only; callers keep their own totals.
pub fn significant(
    entries: Vec<AggregatedEntry>,
    min_duration: Microseconds,
) -> Vec<AggregatedEntry> {
    entries
        .into_iter()
        .filter(|e| e.total_duration >= min_duration)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameFilter;
    use alloc::vec;

    fn fp(frame: &str) -> StackFingerprint {
        StackFingerprint::from_frames([frame], &FrameFilter::default())
    }

    fn event(site: &str, frame: &str, millis: u64) -> BlockEvent {
        BlockEvent::new(site, fp(frame), 0, Microseconds::from_millis(millis))
    }

    #[test]
    fn test_same_site_and_stack_collapse() {
        let events = vec![event("db.get", "app::a", 30), event("db.get", "app::a", 45)];
        let entries = aggregate(&events);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].occurrences, 2);
        assert_eq!(entries[0].total_duration, Microseconds::from_millis(75));
    }

    #[test]
    fn test_different_stacks_stay_separate() {
        let events = vec![event("db.get", "app::a", 10), event("db.get", "app::b", 10)];
        assert_eq!(aggregate(&events).len(), 2);
    }

    #[test]
    fn test_different_sites_stay_separate() {
        let events = vec![event("db.get", "app::a", 10), event("db.put", "app::a", 10)];
        assert_eq!(aggregate(&events).len(), 2);
    }

    #[test]
    fn test_ranked_by_duration_then_count_then_first_seen() {
        let events = vec![
            event("cache.get", "app::first", 20),
            event("db.get", "app::slow", 90),
            event("queue.add", "app::tie", 10),
            event("queue.add", "app::tie", 10),
            event("cache.get", "app::first", 0),
            event("mail.send", "app::late", 20),
        ];
        let sites: Vec<_> = aggregate(&events).into_iter().map(|e| e.call_site).collect();

        // db.get: 90ms; cache.get and queue.add both 20ms but cache.get was
        // seen first and both have two occurrences; mail.send 20ms once.
        assert_eq!(sites, ["db.get", "cache.get", "queue.add", "mail.send"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_significant_drops_short_entries() {
        let events = vec![event("db.get", "app::a", 5), event("db.put", "app::b", 50)];
        let kept = significant(aggregate(&events), Microseconds::from_millis(10));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].call_site, "db.put");
    }
}
