//! Stack fingerprints - bounded, deduplicatable call stacks.

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec::Vec;

/// Default number of application frames kept in a fingerprint.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 10;

/// Namespace prefix shared by every crate of the monitor itself.
pub const LIBRARY_NAMESPACE: &str = "unblock_";

/// Runtime and platform namespaces that carry no diagnostic value at the top
/// of a captured stack.
pub const DEFAULT_INFRASTRUCTURE_NAMESPACES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "parking_lot::",
    "tokio::",
    "futures::",
];

/// Decides which captured frames make it into a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilter {
    library_namespace: String,
    infrastructure: Vec<String>,
    max_depth: usize,
}

impl FrameFilter {
    /// Create a filter with no infrastructure namespaces.
    pub fn new(library_namespace: impl Into<String>, max_depth: usize) -> Self {
        Self {
            library_namespace: library_namespace.into(),
            infrastructure: Vec::new(),
            max_depth,
        }
    }

    /// Add a namespace whose leading frames are skipped.
    pub fn skip_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.infrastructure.push(namespace.into());
        self
    }

    /// Set the maximum number of retained frames.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The retained frame cap.
    pub fn depth(&self) -> usize {
        self.max_depth
    }

    /// Whether a frame belongs to the monitor itself.
    pub fn is_library_frame(&self, frame: &str) -> bool {
        namespace_of(frame).starts_with(self.library_namespace.as_str())
    }

    /// Whether a frame belongs to the monitor or to an infrastructure namespace.
    pub fn is_infrastructure_frame(&self, frame: &str) -> bool {
        let ns = namespace_of(frame);
        self.is_library_frame(frame)
            || self.infrastructure.iter().any(|p| ns.starts_with(p.as_str()))
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        DEFAULT_INFRASTRUCTURE_NAMESPACES
            .iter()
            .fold(Self::new(LIBRARY_NAMESPACE, DEFAULT_MAX_STACK_DEPTH), |f, ns| {
                f.skip_namespace(*ns)
            })
    }
}

/// Trait-impl frames render as `<my_app::Type as Trait>::method`; the owning
/// namespace is the path after the angle bracket.
fn namespace_of(frame: &str) -> &str {
    frame.trim_start().trim_start_matches('<')
}

/// The application-meaningful part of a call stack.
///
/// Equality, hashing and ordering are structural over the retained frames, so
/// two blocking accesses from the same code path produce equal fingerprints
/// regardless of when they happened.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct StackFingerprint(#[cfg_attr(feature = "minicbor", n(0))] Vec<String>);

impl StackFingerprint {
    /// Build a fingerprint from a most-recent-first stack.
    ///
    /// Leading library and infrastructure frames are skipped; from the first
    /// application frame on, at most `filter.depth()` frames are kept. Library
    /// frames deeper in the stack (a closure run by the monitor, say) are
    /// dropped as well.
    pub fn from_frames<I, S>(frames: I, filter: &FrameFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let retained = frames
            .into_iter()
            .skip_while(|f| filter.is_infrastructure_frame(f.as_ref()))
            .filter(|f| !filter.is_library_frame(f.as_ref()))
            .take(filter.depth())
            .map(|f| f.as_ref().to_owned())
            .collect();
        Self(retained)
    }

    /// Retained frames, most recent first.
    pub fn frames(&self) -> &[String] {
        &self.0
    }

    /// Number of retained frames.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no application frame survived filtering.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
