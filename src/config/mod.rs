//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! The resolved [`RunConfig`] is passed explicitly to the benchmark, the
//! runner and the exporters.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings for one benchmark invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Identifier attached to every exported document
    #[serde(default = "default_run_id")]
    pub run_id: String,
    #[serde(default)]
    pub verbosity: Verbosity,
    /// Print exported documents to stdout as JSON
    #[serde(default)]
    pub print_json: bool,
    #[serde(default)]
    pub export_mode: ExportMode,
    /// Upper bound on the benchmark subprocess runtime
    pub timeout_secs: Option<u64>,
    pub elasticsearch: Option<ElasticsearchConfig>,
}

fn default_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: default_run_id(),
            verbosity: Verbosity::default(),
            print_json: false,
            export_mode: ExportMode::default(),
            timeout_secs: None,
            elasticsearch: None,
        }
    }
}

/// How much the tool logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Resolve the `--quiet` / `--verbose` flag pair, quiet winning
    pub fn from_flags(quiet: bool, verbose: bool) -> Option<Self> {
        if quiet {
            Some(Verbosity::Quiet)
        } else if verbose {
            Some(Verbosity::Verbose)
        } else {
            None
        }
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "off",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Shape of the documents handed to the exporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// One document holding every record, the profile and the command
    #[default]
    Combined,
    /// One document per statistics record plus a summary document
    PerRecord,
}

/// Elasticsearch bulk exporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub url: String,
    #[serde(default)]
    pub index: String,
    /// Accept invalid TLS certificates
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Buffered bytes that trigger a bulk request
    #[serde(default = "default_flush_bytes")]
    pub flush_bytes: usize,
    /// Retries for throttled or unavailable responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay, doubled on each attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_flush_interval_secs() -> u64 {
    10
}

fn default_flush_bytes() -> usize {
    1_000_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: index.into(),
            skip_verify: false,
            flush_interval_secs: default_flush_interval_secs(),
            flush_bytes: default_flush_bytes(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Build the run configuration from the global flags
///
/// The TOML file named by `--config` is loaded first, flags override it, and
/// the result is validated.
pub fn resolve(args: &cli::GlobalArgs) -> Result<RunConfig> {
    let base = match &args.config {
        Some(path) => toml::parse_toml_file(path)?,
        None => RunConfig::default(),
    };

    let config = toml::merge_cli_with_config(args, base)?;
    validator::validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

// Display trait implementations

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run ID: {}", self.run_id)?;
        writeln!(f, "Verbosity: {}", self.verbosity)?;
        writeln!(f, "Export mode: {}", self.export_mode)?;
        writeln!(f, "Print JSON: {}", self.print_json)?;
        match self.timeout_secs {
            Some(secs) => writeln!(f, "Timeout: {}s", secs)?,
            None => writeln!(f, "Timeout: none")?,
        }
        match &self.elasticsearch {
            Some(es) => write!(f, "Elasticsearch: {}", es),
            None => write!(f, "Elasticsearch: disabled"),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Quiet => write!(f, "quiet"),
            Verbosity::Normal => write!(f, "normal"),
            Verbosity::Verbose => write!(f, "verbose"),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Combined => write!(f, "combined"),
            ExportMode::PerRecord => write!(f, "per-record"),
        }
    }
}

impl fmt::Display for ElasticsearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} index={} flush={}s/{}B retries={}{}",
            self.url,
            self.index,
            self.flush_interval_secs,
            self.flush_bytes,
            self.max_retries,
            if self.skip_verify { " (TLS verification disabled)" } else { "" }
        )
    }
}
