//! uperf network benchmark
//!
//! uperf is driven by an XML workload profile and reports its statistics as
//! human-readable console output. This module loads the profile, runs uperf
//! (or replays a captured transcript), decodes the output into typed records
//! and exports them.

pub mod classify;
pub mod document;
pub mod error;
pub mod stats;
pub mod stdout;
pub mod workload;

pub use document::ResultDocument;
pub use stdout::parse_stdout;
pub use workload::{load_workload, Profile, Workload};

use super::runner::CommandRunner;
use super::{Benchmark, RunMetadata};
use crate::config::{ExportMode, RunConfig};
use crate::output::{marshal_and_export, Exporter};
use crate::util::time::{unix_now, RunWindow};
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use stats::StatRecord;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const BENCHMARK_NAME: &str = "uperf";

/// Everything one uperf run produced, exported as a single document
#[derive(Debug, Serialize)]
pub struct UperfResultPayload<'a> {
    pub result: &'a ResultDocument,
    pub profile: Option<&'a Profile>,
    pub cmd: &'a [String],
    pub metadata: &'a RunMetadata,
    pub start_time: i64,
    pub end_time: i64,
    pub timestamp: i64,
}

/// One statistics record with the run it belongs to
#[derive(Debug, Serialize)]
pub struct StatDocument<'a> {
    pub metadata: &'a RunMetadata,
    pub timestamp: i64,
    #[serde(flatten)]
    pub stat: &'a StatRecord,
}

/// Per-run context sent alongside per-record documents
#[derive(Debug, Serialize)]
pub struct UperfSummaryDocument<'a> {
    pub metadata: &'a RunMetadata,
    pub profile: Option<&'a Profile>,
    pub cmd: &'a [String],
    pub extra_output: &'a str,
    pub record_count: usize,
    pub start_time: i64,
    pub end_time: i64,
    pub timestamp: i64,
}

/// Runs uperf with a workload profile and exports the parsed statistics
pub struct UperfBenchmark {
    workload_path: Option<PathBuf>,
    cmd: Vec<String>,
    runner: Box<dyn CommandRunner>,
    workload: Option<Workload>,
    metadata: Option<RunMetadata>,
    export_mode: ExportMode,
    result: Option<ResultDocument>,
}

impl UperfBenchmark {
    /// `workload_path` is loaded during setup; without one the exported
    /// documents carry no profile
    pub fn new(workload_path: Option<PathBuf>, cmd: Vec<String>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            workload_path,
            cmd,
            runner,
            workload: None,
            metadata: None,
            export_mode: ExportMode::default(),
            result: None,
        }
    }

    /// Workload loaded by setup
    pub fn workload(&self) -> Option<&Workload> {
        self.workload.as_ref()
    }

    /// Statistics decoded by the last run
    pub fn result(&self) -> Option<&ResultDocument> {
        self.result.as_ref()
    }

    /// Serialise the documents to export for one run
    pub fn build_documents(
        &self,
        metadata: &RunMetadata,
        result: &ResultDocument,
        window: &RunWindow,
        timestamp: i64,
    ) -> Result<Vec<serde_json::Value>> {
        let profile = self.workload.as_ref().map(|w| &w.profile);
        let start_time = window.start.timestamp();
        let end_time = window.end.timestamp();

        let documents = match self.export_mode {
            ExportMode::Combined => {
                let payload = UperfResultPayload {
                    result,
                    profile,
                    cmd: &self.cmd,
                    metadata,
                    start_time,
                    end_time,
                    timestamp,
                };
                vec![serde_json::to_value(&payload).context("Failed to encode uperf result payload")?]
            }
            ExportMode::PerRecord => {
                let mut documents = Vec::with_capacity(result.records().len() + 1);
                for stat in result.records() {
                    let document = StatDocument {
                        metadata,
                        timestamp,
                        stat,
                    };
                    documents.push(serde_json::to_value(&document).context("Failed to encode uperf record")?);
                }
                let summary = UperfSummaryDocument {
                    metadata,
                    profile,
                    cmd: &self.cmd,
                    extra_output: result.extra_output(),
                    record_count: result.records().len(),
                    start_time,
                    end_time,
                    timestamp,
                };
                documents.push(serde_json::to_value(&summary).context("Failed to encode uperf summary")?);
                documents
            }
        };

        Ok(documents)
    }
}

#[async_trait]
impl Benchmark for UperfBenchmark {
    fn name(&self) -> &'static str {
        BENCHMARK_NAME
    }

    async fn setup(&mut self, config: &RunConfig) -> Result<()> {
        if let Some(ref path) = self.workload_path {
            let workload = load_workload(path)?;
            info!(profile = %workload.profile, path = %path.display(), "Loaded uperf workload");
            debug!(workload = %workload.text, "Substituted workload");
            self.workload = Some(workload);
        }

        self.metadata = Some(RunMetadata::new(config, BENCHMARK_NAME));
        self.export_mode = config.export_mode;
        info!("Initialised the uperf benchmark");
        Ok(())
    }

    async fn run(&mut self, exporter: &mut dyn Exporter) -> Result<()> {
        let metadata = self
            .metadata
            .clone()
            .context("uperf run called before setup")?;

        info!(cmd = %self.cmd.join(" "), workload = ?self.workload_path, "Running uperf");
        let output = self.runner.run(&self.cmd).await?;
        info!(elapsed = ?output.window.elapsed, "uperf finished, parsing results");
        debug!(stdout = %output.stdout, "Received uperf stdout");

        let result = parse_stdout(&output.stdout).context("Failed to parse uperf stdout")?;
        if result.records().is_empty() {
            warn!("uperf output contained no statistics");
        }

        let documents = self.build_documents(&metadata, &result, &output.window, unix_now())?;
        info!(documents = documents.len(), mode = %self.export_mode, "Exporting uperf results");
        for document in &documents {
            marshal_and_export(exporter, document)
                .await
                .with_context(|| format!("Failed to export uperf results via {}", exporter.name()))?;
        }

        self.result = Some(result);
        Ok(())
    }

    async fn teardown(&mut self, _config: &RunConfig) -> Result<()> {
        info!("uperf benchmark finished");
        Ok(())
    }
}
