//! Result exporters
//!
//! A benchmark hands every finished document to an [`Exporter`]. The exporter
//! decides how a document is encoded (`marshal`) and where the bytes go
//! (`export`). Exporters are set up and health-checked before the benchmark
//! starts and torn down after it finishes, so buffering exporters flush in
//! `teardown`.

pub mod chain;
pub mod dummy;
pub mod elasticsearch;
pub mod json;

pub use chain::ChainExporter;
pub use dummy::DummyExporter;
pub use elasticsearch::ElasticsearchExporter;
pub use json::JsonExporter;

use crate::config::RunConfig;
use crate::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// Destination for benchmark result documents
#[async_trait]
pub trait Exporter: Send {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Prepare the exporter (open clients, start background workers)
    async fn setup(&mut self, config: &RunConfig) -> Result<()>;

    /// Check the destination is reachable and ready
    async fn healthcheck(&mut self) -> Result<()>;

    /// Encode a document for this exporter
    fn marshal(&mut self, document: &serde_json::Value) -> Result<Vec<u8>>;

    /// Send one marshalled document
    async fn export(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Flush anything buffered and release resources
    async fn teardown(&mut self) -> Result<()>;
}

/// Encode `document` with `exporter` and export it
pub async fn marshal_and_export(
    exporter: &mut dyn Exporter,
    document: &serde_json::Value,
) -> Result<()> {
    let payload = exporter.marshal(document)?;
    exporter.export(payload).await
}

/// Pick the exporter(s) the configuration asks for
///
/// Elasticsearch and JSON printing may both be enabled, in which case they
/// are chained. With neither, documents are dropped by a [`DummyExporter`].
pub fn build_exporter(config: &RunConfig) -> Box<dyn Exporter> {
    let mut exporters: Vec<Box<dyn Exporter>> = Vec::new();

    if let Some(ref es) = config.elasticsearch {
        info!(url = %es.url, index = %es.index, "Creating Elasticsearch exporter");
        exporters.push(Box::new(ElasticsearchExporter::new(es.clone())));
    }

    if config.print_json {
        info!("Creating JSON exporter");
        exporters.push(Box::new(JsonExporter::stdout()));
    }

    match exporters.len() {
        0 => {
            warn!("No exporter configured, results will be discarded");
            Box::new(DummyExporter)
        }
        1 => exporters.remove(0),
        _ => Box::new(ChainExporter::new(exporters)),
    }
}
