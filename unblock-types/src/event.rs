//! A single observed blocking access.

use alloc::string::String;

use crate::{Microseconds, StackFingerprint};

/// One retrieval that had to wait because the result was not ready yet.
///
/// Two events with the same `(call_site, fingerprint)` identity describe the
/// same blocking site; their timing is irrelevant for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct BlockEvent {
    /// Label of the operation that blocked, e.g. `datastore_v3.Get`.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub call_site: String,

    /// Where in the application the blocking retrieval happened.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub fingerprint: StackFingerprint,

    /// Unix timestamp in milliseconds when the wait began.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub started_at_ms: u64,

    /// How long the caller waited.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub duration: Microseconds,
}

impl BlockEvent {
    /// Create an event.
    pub fn new(
        call_site: impl Into<String>,
        fingerprint: StackFingerprint,
        started_at_ms: u64,
        duration: Microseconds,
    ) -> Self {
        Self {
            call_site: call_site.into(),
            fingerprint,
            started_at_ms,
            duration,
        }
    }

    /// The deduplication identity.
    pub fn identity(&self) -> (&str, &StackFingerprint) {
        (&self.call_site, &self.fingerprint)
    }
}
