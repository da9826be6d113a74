//! CLI argument parsing using clap

use super::ExportMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// BenchPulse - run network benchmarks and export structured results
#[derive(Parser, Debug)]
#[command(name = "benchpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable logging (takes precedence over --verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print exported documents to stdout as JSON
    #[arg(short = 'p', long, global = true)]
    pub print_json: bool,

    /// Run identifier attached to exported documents (default: random UUID)
    #[arg(short = 'u', long = "uuid", value_name = "ID", global = true)]
    pub run_id: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Elasticsearch base URL (e.g., https://localhost:9200)
    #[arg(long, value_name = "URL", global = true)]
    pub elasticsearch_url: Option<String>,

    /// Elasticsearch index receiving the documents
    #[arg(long, value_name = "INDEX", global = true)]
    pub elasticsearch_index: Option<String>,

    /// Accept invalid TLS certificates from Elasticsearch
    #[arg(long, global = true)]
    pub elasticsearch_skip_verify: bool,

    /// Export one combined document or one document per record
    #[arg(long, value_enum, global = true)]
    pub export_mode: Option<ExportMode>,

    /// Maximum benchmark runtime (e.g., 90s, 5m, 1h)
    #[arg(long, value_name = "DURATION", global = true)]
    pub timeout: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a benchmark, parse its output and export the results
    Run {
        #[command(subcommand)]
        benchmark: RunBenchmark,
    },
    /// Parse previously captured benchmark output and export the results
    Parse {
        #[command(subcommand)]
        benchmark: ParseBenchmark,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunBenchmark {
    /// Run the uperf network benchmark
    Uperf(UperfRunArgs),
}

#[derive(Subcommand, Debug)]
pub enum ParseBenchmark {
    /// Parse captured uperf stdout
    Uperf(UperfParseArgs),
}

/// Arguments for `run uperf`
#[derive(Args, Debug, Clone)]
pub struct UperfRunArgs {
    /// uperf executable
    #[arg(long, value_name = "BIN", default_value = "uperf", env = "BENCHPULSE_UPERF_BIN")]
    pub uperf_bin: PathBuf,

    /// Workload profile (XML)
    #[arg(value_name = "WORKLOAD")]
    pub workload: PathBuf,

    /// Extra arguments passed to uperf after `--`
    #[arg(last = true, value_name = "EXTRA")]
    pub extra_args: Vec<String>,
}

impl UperfRunArgs {
    /// Command line uperf is started with
    pub fn command_line(&self) -> Vec<String> {
        let mut cmd = vec![
            self.uperf_bin.display().to_string(),
            "-m".to_string(),
            self.workload.display().to_string(),
        ];
        cmd.extend(self.extra_args.iter().cloned());
        cmd
    }
}

/// Arguments for `parse uperf`
#[derive(Args, Debug, Clone)]
pub struct UperfParseArgs {
    /// Captured uperf stdout, or `-` for standard input
    #[arg(value_name = "STDOUT_FILE")]
    pub stdout: PathBuf,

    /// Workload profile the transcript was produced with
    #[arg(long, value_name = "FILE")]
    pub workload: Option<PathBuf>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_uperf_with_extra_args() {
        let cli = Cli::try_parse_from([
            "benchpulse", "run", "-v", "uperf", "--uperf-bin", "/opt/uperf", "iperf.xml", "--", "-a", "-R",
        ])
        .unwrap();

        assert!(cli.global.verbose);
        match cli.command {
            Command::Run { benchmark: RunBenchmark::Uperf(args) } => {
                assert_eq!(
                    args.command_line(),
                    vec!["/opt/uperf", "-m", "iperf.xml", "-a", "-R"]
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_anywhere() {
        let cli = Cli::try_parse_from([
            "benchpulse",
            "--uuid",
            "abc",
            "run",
            "uperf",
            "w.xml",
            "--print-json",
            "--export-mode",
            "per-record",
            "--timeout",
            "5m",
        ])
        .unwrap();

        assert_eq!(cli.global.run_id.as_deref(), Some("abc"));
        assert!(cli.global.print_json);
        assert_eq!(cli.global.export_mode, Some(ExportMode::PerRecord));
        assert_eq!(cli.global.timeout.as_deref(), Some("5m"));
    }

    #[test]
    fn test_parse_uperf_args() {
        let cli = Cli::try_parse_from(["benchpulse", "parse", "uperf", "-", "--workload", "w.xml"]).unwrap();
        match cli.command {
            Command::Parse { benchmark: ParseBenchmark::Uperf(args) } => {
                assert_eq!(args.stdout, PathBuf::from("-"));
                assert_eq!(args.workload, Some(PathBuf::from("w.xml")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_workload() {
        assert!(Cli::try_parse_from(["benchpulse", "run", "uperf"]).is_err());
    }
}
