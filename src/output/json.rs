//! JSON exporter
//!
//! Documents are pretty-printed with four-space indentation and buffered.
//! Teardown writes them out as a single JSON array so the output can be piped
//! straight into `jq`.

use super::Exporter;
use crate::config::RunConfig;
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::{self, Write};

/// Buffers documents and prints them as a JSON array on teardown
pub struct JsonExporter {
    documents: Vec<Vec<u8>>,
    writer: Box<dyn Write + Send>,
}

impl JsonExporter {
    /// Exporter printing to standard output
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            documents: Vec::new(),
            writer,
        }
    }

    /// Number of documents waiting for teardown
    pub fn buffered(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn setup(&mut self, _config: &RunConfig) -> Result<()> {
        self.documents.clear();
        Ok(())
    }

    async fn healthcheck(&mut self) -> Result<()> {
        Ok(())
    }

    fn marshal(&mut self, document: &serde_json::Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        document
            .serialize(&mut serializer)
            .context("Failed to encode document as JSON")?;
        Ok(out)
    }

    async fn export(&mut self, payload: Vec<u8>) -> Result<()> {
        self.documents.push(payload);
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        let mut out = Vec::new();
        out.push(b'[');
        for (i, doc) in self.documents.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.extend_from_slice(doc);
        }
        out.extend_from_slice(b"]\n");

        self.writer
            .write_all(&out)
            .and_then(|_| self.writer.flush())
            .context("Failed to write JSON documents")?;
        self.documents.clear();
        Ok(())
    }
}
