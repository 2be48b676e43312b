//! Report severity levels.

use core::fmt;
use core::str::FromStr;

/// How bad the blocking in one scope was.
///
/// Ordered from least to most severe so reports can be filtered with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum Severity {
    /// No asynchronous activity was observed.
    #[cfg_attr(feature = "minicbor", n(0))]
    Debug,
    /// Blocking stayed within the deadline.
    #[default]
    #[cfg_attr(feature = "minicbor", n(1))]
    Info,
    /// Blocking exceeded the deadline.
    #[cfg_attr(feature = "minicbor", n(2))]
    Warning,
    /// Blocking exceeded the deadline and the escalation policy.
    #[cfg_attr(feature = "minicbor", n(3))]
    Error,
}

impl Severity {
    /// Lowercase name, as used in serialized reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Debug => "DBG",
            Severity::Info => "OK",
            Severity::Warning => "WARN",
            Severity::Error => "ERR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSeverity;

impl fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of: debug, info, warning, error")
    }
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" | "severe" => Ok(Severity::Error),
            _ => Err(UnknownSeverity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_severity() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_parses_common_spellings() {
        assert_eq!("WARN".parse(), Ok(Severity::Warning));
        assert_eq!(" warning ".parse(), Ok(Severity::Warning));
        assert_eq!("severe".parse(), Ok(Severity::Error));
        assert_eq!("loud".parse::<Severity>(), Err(UnknownSeverity));
    }
}
