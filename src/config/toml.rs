//! TOML configuration file parsing

use super::cli::GlobalArgs;
use super::{ElasticsearchConfig, RunConfig, Verbosity};
use crate::util::units::parse_duration;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Convert a duration flag such as `90s` or `5m` into whole seconds, rounding up
pub fn parse_timeout(text: &str) -> Result<u64> {
    let seconds = parse_duration(text)
        .with_context(|| format!("Invalid timeout: {}", text))?;
    if seconds < 0.0 {
        anyhow::bail!("Timeout must not be negative: {}", text);
    }
    Ok(seconds.ceil() as u64)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(args: &GlobalArgs, mut config: RunConfig) -> Result<RunConfig> {
    if let Some(ref run_id) = args.run_id {
        config.run_id = run_id.clone();
    }

    if let Some(verbosity) = Verbosity::from_flags(args.quiet, args.verbose) {
        config.verbosity = verbosity;
    }

    if args.print_json {
        config.print_json = true;
    }

    if let Some(mode) = args.export_mode {
        config.export_mode = mode;
    }

    if let Some(ref timeout) = args.timeout {
        config.timeout_secs = Some(parse_timeout(timeout)?);
    }

    // Override Elasticsearch settings, creating the section if only flags name it
    if let Some(ref url) = args.elasticsearch_url {
        match config.elasticsearch.as_mut() {
            Some(es) => es.url = url.clone(),
            None => {
                config.elasticsearch = Some(ElasticsearchConfig::new(url.clone(), String::new()));
            }
        }
    } else if config.elasticsearch.is_none()
        && (args.elasticsearch_index.is_some() || args.elasticsearch_skip_verify)
    {
        anyhow::bail!("--elasticsearch-index and --elasticsearch-skip-verify require --elasticsearch-url");
    }

    if let Some(es) = config.elasticsearch.as_mut() {
        if let Some(ref index) = args.elasticsearch_index {
            es.index = index.clone();
        }
        if args.elasticsearch_skip_verify {
            es.skip_verify = true;
        }
    }

    Ok(config)
}
