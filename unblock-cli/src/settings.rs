//! Roll-up settings: defaults, then an optional TOML file, then
//! `UNBLOCK_CLI_*` environment variables. Command-line flags are applied on
//! top by the binary.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use unblock_types::Severity;

use crate::duration::parse_duration;
use crate::rollup::Filter;

pub const ENV_PREFIX: &str = "UNBLOCK_CLI";

/// ```toml
/// min_severity = "warning"
/// min_total = "50ms"
/// top = 20
/// scope = "/api/"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupSettings {
    pub min_severity: String,
    /// Duration string, see [`parse_duration`].
    pub min_total: String,
    pub top: usize,
    pub scope: Option<String>,
}

impl Default for RollupSettings {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning.as_str().to_string(),
            min_total: "0".to_string(),
            top: 20,
            scope: None,
        }
    }
}

impl RollupSettings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .context("failed to load roll-up settings")
    }

    /// Validate the string-typed thresholds.
    pub fn filter(&self) -> Result<Filter> {
        let min_severity: Severity = self
            .min_severity
            .parse()
            .map_err(|err| anyhow!("invalid min_severity '{}': {}", self.min_severity, err))?;
        let min_total = parse_duration(&self.min_total)
            .with_context(|| format!("invalid min_total '{}'", self.min_total))?;
        Ok(Filter {
            min_severity,
            min_total,
            description: self.scope.clone(),
        })
    }
}
