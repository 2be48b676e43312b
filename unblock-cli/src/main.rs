use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use unblock_cli::render::{self, View};
use unblock_cli::rollup::rollup;
use unblock_cli::settings::RollupSettings;
use unblock_cli::source;

#[derive(Parser, Debug)]
#[command(name = "unblock")]
#[command(about = "Find call sites whose asynchronous results are waited on one after another")]
struct Args {
    /// Reports written by the file output, one JSON object per line (`-` for stdin)
    #[arg(default_value = "unblock-reports.jsonl")]
    file: PathBuf,

    /// TOML settings file (also read from UNBLOCK_CLI_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore reports below this severity (debug, info, warning, error)
    #[arg(long)]
    min_severity: Option<String>,

    /// Hide sites that blocked for less than this in total (e.g. "50ms", "1s")
    #[arg(long)]
    min_total: Option<String>,

    /// Only reports whose scope description contains this text
    #[arg(short, long)]
    scope: Option<String>,

    /// Number of rows to print
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// List scopes instead of call sites
    #[arg(long)]
    by_scope: bool,

    /// Print the roll-up as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = RollupSettings::load(args.config.as_deref())?;
    if let Some(min_severity) = args.min_severity {
        settings.min_severity = min_severity;
    }
    if let Some(min_total) = args.min_total {
        settings.min_total = min_total;
    }
    if let Some(top) = args.top {
        settings.top = top;
    }
    if args.scope.is_some() {
        settings.scope = args.scope;
    }
    debug!(?settings, "roll-up settings");
    let filter = settings.filter()?;

    let loaded = source::load(&args.file)?;
    let mut result = rollup(&loaded.reports, &filter);
    result.truncate(settings.top);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        render::json(&mut out, &result, loaded.skipped)?;
    } else {
        let view = if args.by_scope { View::Scopes } else { View::Sites };
        render::text(&mut out, &result, loaded.skipped, view)?;
    }
    out.flush()?;
    Ok(())
}
