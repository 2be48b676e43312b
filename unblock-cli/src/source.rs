//! Reading reports written by the file output.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use unblock_types::Report;

/// Reports parsed from one input, plus how many lines were unusable.
#[derive(Debug, Default)]
pub struct Loaded {
    pub reports: Vec<Report>,
    pub skipped: usize,
}

/// Load newline-delimited JSON reports from `path`, or stdin for `-`.
pub fn load(path: &Path) -> Result<Loaded> {
    if path == Path::new("-") {
        return read(io::stdin().lock());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let loaded = read(BufReader::new(file))?;
    debug!(path = %path.display(), reports = loaded.reports.len(), "loaded reports");
    Ok(loaded)
}

/// Parse reports line by line.
///
/// Blank lines are ignored. Lines that are not valid reports, or that were
/// written with an incompatible schema, are skipped and counted.
pub fn read(reader: impl BufRead) -> Result<Loaded> {
    let mut loaded = Loaded::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read report line")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Report>(&line) {
            Ok(report) if report.version.is_compatible() => loaded.reports.push(report),
            Ok(report) => {
                warn!(
                    line = index + 1,
                    version = ?report.version,
                    "skipping report with incompatible schema"
                );
                loaded.skipped += 1;
            }
            Err(err) => {
                warn!(line = index + 1, %err, "skipping malformed report");
                loaded.skipped += 1;
            }
        }
    }
    Ok(loaded)
}
