mod summary;

use anyhow::Result;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use pingfan_probe::{Orchestrator, RunSettings, SystemPingRunner, DEFAULT_QUEUE_CAPACITY};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pingfan",
    version,
    about = "Ping many hosts at once and print their packet and latency summaries. Only probe hosts you are allowed to test."
)]
struct Cli {
    /// Comma-separated hosts or addresses to probe.
    #[arg(short, long, required = true, value_delimiter = ',')]
    targets: Vec<String>,

    /// Echo requests sent to each target.
    #[arg(short, long, default_value_t = 10)]
    count: u32,

    /// Per-reply wait passed to the probe; 0 leaves the probe's default.
    #[arg(short = 'o', long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Probe program, invoked as `<probe> -c <count> [-W <wait>] <target>`.
    #[arg(long, env = "PINGFAN_PROBE", default_value = "ping")]
    probe: String,

    #[arg(long, default_value_t = 3000)]
    cooldown_ms: u64,

    #[arg(long, default_value_t = 1000)]
    grace_ms: u64,

    /// Summaries held for the printer before new ones are dropped.
    #[arg(
        long,
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    queue_capacity: usize,

    /// Also print every echo reply, not only the end-of-run summaries.
    #[arg(long)]
    echo_replies: bool,

    /// Show a running completion percentage on stderr.
    #[arg(long)]
    progress: bool,

    /// Write a JSON summary of the run to this path.
    #[arg(long)]
    summary: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = RunSettings {
        count: cli.count,
        timeout_ms: cli.timeout_ms,
        cooldown: Duration::from_millis(cli.cooldown_ms),
        grace: Duration::from_millis(cli.grace_ms),
        queue_capacity: cli.queue_capacity,
        echo_replies: cli.echo_replies,
    };

    let runner = Arc::new(SystemPingRunner::new(cli.probe));
    let mut orchestrator = Orchestrator::new(settings, runner);
    if cli.progress {
        orchestrator = orchestrator.with_progress(io::stderr());
    }
    let report = orchestrator.run(&cli.targets, io::stdout())?;

    let unreachable = report.targets.iter().filter(|t| !t.launched).count();
    if unreachable > 0 {
        tracing::info!(
            failed = unreachable,
            total = report.targets.len(),
            "some probes could not be launched"
        );
    }

    if let Some(path) = cli.summary {
        summary::write_summary(&path, &report)?;
        tracing::debug!(path = %path.display(), "wrote run summary");
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,pingfan=debug,pingfan_probe=debug"
    } else {
        "warn,pingfan=info,pingfan_probe=info"
    };
    let filter = EnvFilter::try_from_env("PINGFAN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}
