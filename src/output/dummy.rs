//! Exporter that discards everything

use super::Exporter;
use crate::config::RunConfig;
use crate::Result;
use async_trait::async_trait;

/// Placeholder used when no destination is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyExporter;

#[async_trait]
impl Exporter for DummyExporter {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn setup(&mut self, _config: &RunConfig) -> Result<()> {
        Ok(())
    }

    async fn healthcheck(&mut self) -> Result<()> {
        Ok(())
    }

    fn marshal(&mut self, _document: &serde_json::Value) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn export(&mut self, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dummy_accepts_everything() {
        let mut exporter = DummyExporter;
        exporter.setup(&RunConfig::default()).await.unwrap();
        exporter.healthcheck().await.unwrap();
        let payload = exporter.marshal(&json!({"key": "value"})).unwrap();
        assert!(payload.is_empty());
        exporter.export(payload).await.unwrap();
        exporter.teardown().await.unwrap();
    }
}
