//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &RunConfig) -> Result<()> {
    if config.run_id.trim().is_empty() {
        anyhow::bail!("run_id must not be empty");
    }

    if config.timeout_secs == Some(0) {
        anyhow::bail!("timeout must be greater than zero");
    }

    if let Some(ref es) = config.elasticsearch {
        validate_elasticsearch(es)?;
    }

    Ok(())
}

/// Validate Elasticsearch exporter settings
pub fn validate_elasticsearch(es: &ElasticsearchConfig) -> Result<()> {
    if es.url.trim().is_empty() {
        anyhow::bail!("elasticsearch.url must not be empty");
    }

    if !es.url.starts_with("http://") && !es.url.starts_with("https://") {
        anyhow::bail!("elasticsearch.url must start with http:// or https://, got {}", es.url);
    }

    if es.index.trim().is_empty() {
        anyhow::bail!(
            "elasticsearch.index must be set when an Elasticsearch URL is given ({})",
            es.url
        );
    }

    if es.flush_bytes == 0 {
        anyhow::bail!("elasticsearch.flush_bytes must be greater than zero");
    }

    if es.flush_interval_secs == 0 {
        anyhow::bail!("elasticsearch.flush_interval_secs must be greater than zero");
    }

    if es.skip_verify {
        tracing::warn!(url = %es.url, "TLS certificate verification is disabled for Elasticsearch");
    }

    Ok(())
}
