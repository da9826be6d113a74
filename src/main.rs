//! BenchPulse CLI entry point

use anyhow::{Context, Result};
use benchpulse::benchmark::run_benchmark;
use benchpulse::benchmark::runner::{SubprocessRunner, TranscriptRunner};
use benchpulse::benchmark::uperf::UperfBenchmark;
use benchpulse::config::cli::{Cli, Command, ParseBenchmark, RunBenchmark, UperfParseArgs, UperfRunArgs};
use benchpulse::config::{self, RunConfig};
use benchpulse::output::build_exporter;
use benchpulse::util::logging::init_logging;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = config::resolve(&cli.global)?;
    init_logging(config.verbosity);
    debug!(config = %config, "Resolved configuration");

    let benchmark = match cli.command {
        Command::Run {
            benchmark: RunBenchmark::Uperf(args),
        } => uperf_run(&config, &args),
        Command::Parse {
            benchmark: ParseBenchmark::Uperf(args),
        } => uperf_replay(&args)?,
    };

    execute(&config, benchmark)
}

/// Benchmark that runs uperf as a child process
fn uperf_run(config: &RunConfig, args: &UperfRunArgs) -> UperfBenchmark {
    let timeout = config.timeout_secs.map(Duration::from_secs);
    UperfBenchmark::new(
        Some(args.workload.clone()),
        args.command_line(),
        Box::new(SubprocessRunner::new(timeout)),
    )
}

/// Benchmark that replays a captured uperf transcript
fn uperf_replay(args: &UperfParseArgs) -> Result<UperfBenchmark> {
    let (stdout, captured_at) = read_transcript(&args.stdout)?;
    info!(source = %args.stdout.display(), bytes = stdout.len(), "Replaying uperf transcript");
    Ok(UperfBenchmark::new(
        args.workload.clone(),
        Vec::new(),
        Box::new(TranscriptRunner::new(stdout, captured_at)),
    ))
}

/// Read a transcript from a file (timestamped by its mtime) or `-` for stdin
fn read_transcript(path: &Path) -> Result<(String, DateTime<Utc>)> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read uperf stdout from standard input")?;
        return Ok((text, Utc::now()));
    }

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read uperf stdout file: {}", path.display()))?;
    let captured_at = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok((String::from_utf8_lossy(&bytes).into_owned(), captured_at))
}

fn execute(config: &RunConfig, mut benchmark: UperfBenchmark) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let mut exporter = build_exporter(config);
        run_benchmark(config, &mut benchmark, exporter.as_mut()).await
    })
}
