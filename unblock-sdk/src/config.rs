//! Process-wide monitor configuration.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use unblock_types::{FrameFilter, Microseconds, DEFAULT_MAX_STACK_DEPTH};

use crate::error::ConfigError;

/// Environment variable prefix, e.g. `UNBLOCK_DEADLINE_MS=250`.
pub const ENV_PREFIX: &str = "UNBLOCK";

/// Largest millisecond threshold that still fits in microseconds.
const MAX_THRESHOLD_MS: u64 = u64::MAX / 1000;

/// Blocked-call count used by the count-based escalation policy.
pub const DEFAULT_ERROR_BLOCK_COUNT: u64 = 10;

/// Thresholds and fingerprinting options shared by every scope.
///
/// Values come from defaults, then an optional TOML file, then `UNBLOCK_*`
/// environment variables.
///
/// ```toml
/// deadline_ms = 250
/// error_block_count = 10
/// max_stack_depth = 12
/// min_entry_ms = 5
/// verbose = false
/// infrastructure_namespaces = ["hyper::", "tower::"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Total blocked time a scope may accumulate before it is reported as a warning.
    pub deadline_ms: u64,

    /// When set, a scope over the deadline with more blocked calls than this
    /// is escalated to an error.
    pub error_block_count: Option<u64>,

    /// Application frames kept per fingerprint.
    pub max_stack_depth: usize,

    /// Entries blocked for less than this are left out of non-verbose reports.
    pub min_entry_ms: u64,

    /// Always include the per-site breakdown.
    pub verbose: bool,

    /// Namespaces skipped at the top of captured stacks, in addition to the
    /// runtime namespaces that are always skipped.
    pub infrastructure_namespaces: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 500,
            error_block_count: None,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            min_entry_ms: 0,
            verbose: false,
            infrastructure_namespaces: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load from `UNBLOCK_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with_prefix(None, ENV_PREFIX)
    }

    /// Load from a TOML file, then apply `UNBLOCK_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_prefix(Some(path), ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("infrastructure_namespaces"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_depth == 0 {
            return Err(ConfigError::Invalid("max_stack_depth must be at least 1".into()));
        }
        let thresholds = [("deadline_ms", self.deadline_ms), ("min_entry_ms", self.min_entry_ms)];
        for (name, value) in thresholds {
            if value > MAX_THRESHOLD_MS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {MAX_THRESHOLD_MS}"
                )));
            }
        }
        if self.error_block_count == Some(0) {
            return Err(ConfigError::Invalid("error_block_count must be at least 1".into()));
        }
        Ok(())
    }

    /// The count-based policy: escalate once more than ten calls block.
    pub fn count_policy() -> Self {
        Self {
            error_block_count: Some(DEFAULT_ERROR_BLOCK_COUNT),
            ..Self::default()
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn min_entry(&self) -> Microseconds {
        Microseconds::from_millis(self.min_entry_ms)
    }

    /// The frame filter fingerprints are built with.
    pub fn frame_filter(&self) -> FrameFilter {
        self.infrastructure_namespaces
            .iter()
            .fold(FrameFilter::default().max_depth(self.max_stack_depth), |f, ns| {
                f.skip_namespace(ns.clone())
            })
    }
}
