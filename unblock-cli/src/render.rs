//! Text and JSON rendering of a [`Rollup`].

use std::io::{self, Write};

use serde_json::json;

use crate::rollup::Rollup;

/// Which table the text rendering leads with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Sites,
    Scopes,
}

/// Frames printed under each site.
const FRAMES_SHOWN: usize = 3;

pub fn text(out: &mut impl Write, rollup: &Rollup, skipped: usize, view: View) -> io::Result<()> {
    write!(out, "{} reports", rollup.reports)?;
    if rollup.without_detail > 0 {
        write!(out, ", {} without per-site detail", rollup.without_detail)?;
    }
    if skipped > 0 {
        write!(out, ", {} unreadable lines skipped", skipped)?;
    }
    writeln!(out)?;

    if rollup.reports == 0 {
        return Ok(());
    }
    writeln!(out)?;

    match view {
        View::Sites => sites(out, rollup),
        View::Scopes => scopes(out, rollup),
    }
}

fn sites(out: &mut impl Write, rollup: &Rollup) -> io::Result<()> {
    if rollup.sites.is_empty() {
        return writeln!(out, "No blocking sites matched.");
    }

    writeln!(
        out,
        "{:<10} {:>6} {:<10} {:>6}  CALL SITE",
        "TOTAL", "COUNT", "MEAN", "SCOPES"
    )?;
    for site in &rollup.sites {
        writeln!(
            out,
            "{:<10} {:>6} {:<10} {:>6}  {}",
            site.total_duration.to_string(),
            site.occurrences,
            site.mean_duration().to_string(),
            site.scopes,
            site.call_site
        )?;
        let frames = site.fingerprint.frames();
        for frame in frames.iter().take(FRAMES_SHOWN) {
            writeln!(out, "    at {}", frame)?;
        }
        if frames.len() > FRAMES_SHOWN {
            writeln!(out, "    ... {} more", frames.len() - FRAMES_SHOWN)?;
        }
        writeln!(out, "    in {}", site.examples.join(", "))?;
    }
    Ok(())
}

fn scopes(out: &mut impl Write, rollup: &Rollup) -> io::Result<()> {
    writeln!(
        out,
        "{:<5} {:>7} {:>15} {:<10}  SCOPE",
        "SEV", "REPORTS", "BLOCKED", "TOTAL"
    )?;
    for scope in &rollup.scopes {
        let blocked = format!(
            "{}/{} ({}%)",
            scope.blocked_calls,
            scope.total_calls,
            scope.blocked_percent()
        );
        writeln!(
            out,
            "{:<5} {:>7} {:>15} {:<10}  {}",
            scope.worst.symbol(),
            scope.reports,
            blocked,
            scope.total_blocked.to_string(),
            scope.description
        )?;
    }
    Ok(())
}

pub fn json(out: &mut impl Write, rollup: &Rollup, skipped: usize) -> io::Result<()> {
    let value = json!({
        "summary": {
            "reports": rollup.reports,
            "without_detail": rollup.without_detail,
            "skipped_lines": skipped,
            "sites": rollup.sites.len(),
            "scopes": rollup.scopes.len(),
        },
        "sites": rollup.sites,
        "scopes": rollup.scopes,
    });
    serde_json::to_writer_pretty(&mut *out, &value)?;
    writeln!(out)
}
