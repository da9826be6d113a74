//! Fan-out over several exporters

use super::Exporter;
use crate::config::RunConfig;
use crate::Result;
use async_trait::async_trait;
use tracing::warn;

/// Drives several exporters as one
///
/// `marshal` stores one encoded copy per exporter and returns an empty
/// payload; the following `export` sends each stored copy to its exporter.
pub struct ChainExporter {
    exporters: Vec<Box<dyn Exporter>>,
    marshalled: Vec<Vec<u8>>,
}

impl ChainExporter {
    pub fn new(exporters: Vec<Box<dyn Exporter>>) -> Self {
        Self {
            exporters,
            marshalled: Vec::new(),
        }
    }
}

#[async_trait]
impl Exporter for ChainExporter {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn setup(&mut self, config: &RunConfig) -> Result<()> {
        for exporter in self.exporters.iter_mut() {
            exporter.setup(config).await?;
        }
        Ok(())
    }

    async fn healthcheck(&mut self) -> Result<()> {
        for exporter in self.exporters.iter_mut() {
            exporter.healthcheck().await?;
        }
        Ok(())
    }

    fn marshal(&mut self, document: &serde_json::Value) -> Result<Vec<u8>> {
        let mut marshalled = Vec::with_capacity(self.exporters.len());
        for exporter in self.exporters.iter_mut() {
            marshalled.push(exporter.marshal(document)?);
        }
        self.marshalled = marshalled;
        Ok(Vec::new())
    }

    async fn export(&mut self, _payload: Vec<u8>) -> Result<()> {
        if self.marshalled.len() != self.exporters.len() {
            anyhow::bail!("chain exporter: export called without a preceding marshal");
        }

        let marshalled = std::mem::take(&mut self.marshalled);
        for (exporter, payload) in self.exporters.iter_mut().zip(marshalled) {
            exporter.export(payload).await?;
        }
        Ok(())
    }

    /// Every exporter is torn down even if an earlier one fails
    async fn teardown(&mut self) -> Result<()> {
        let mut first_error = None;
        for exporter in self.exporters.iter_mut() {
            if let Err(e) = exporter.teardown().await {
                warn!(exporter = exporter.name(), error = %e, "Exporter teardown failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
