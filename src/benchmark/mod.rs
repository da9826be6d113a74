//! Benchmarks and the orchestration around them
//!
//! A [`Benchmark`] knows how to prepare, execute and parse one benchmark
//! tool. [`run_benchmark`] drives it together with an [`Exporter`] through
//! the fixed lifecycle:
//!
//! 1. exporter setup and healthcheck
//! 2. benchmark setup
//! 3. benchmark run (parse and export)
//! 4. benchmark teardown, then exporter teardown, even if an earlier step failed

pub mod runner;
pub mod uperf;

use crate::config::RunConfig;
use crate::output::Exporter;
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// A benchmark the tool can run and export
#[async_trait]
pub trait Benchmark: Send {
    /// Benchmark name recorded in exported metadata
    fn name(&self) -> &'static str;

    async fn setup(&mut self, config: &RunConfig) -> Result<()>;

    /// Execute the benchmark and hand its documents to `exporter`
    async fn run(&mut self, exporter: &mut dyn Exporter) -> Result<()>;

    async fn teardown(&mut self, config: &RunConfig) -> Result<()>;
}

/// Identifies the run a document belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub benchmark: String,
    pub hostname: String,
    pub version: String,
}

impl RunMetadata {
    pub fn new(config: &RunConfig, benchmark: &str) -> Self {
        Self {
            run_id: config.run_id.clone(),
            benchmark: benchmark.to_string(),
            hostname: local_hostname(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "Unable to read hostname");
            "unknown".to_string()
        }
    }
}

/// Run `benchmark` end to end, exporting through `exporter`
///
/// Both teardowns are always attempted. The first error encountered is
/// returned; later teardown errors are logged.
pub async fn run_benchmark(
    config: &RunConfig,
    benchmark: &mut dyn Benchmark,
    exporter: &mut dyn Exporter,
) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        run_id = %config.run_id,
        benchmark = benchmark.name(),
        exporter = exporter.name(),
        "Starting benchpulse"
    );

    let outcome: Result<()> = async {
        exporter.setup(config).await.context("Exporter setup failed")?;
        exporter.healthcheck().await.context("Exporter healthcheck failed")?;
        benchmark
            .setup(config)
            .await
            .with_context(|| format!("{} setup failed", benchmark.name()))?;
        benchmark
            .run(exporter)
            .await
            .with_context(|| format!("{} run failed", benchmark.name()))
    }
    .await;

    let benchmark_teardown = benchmark
        .teardown(config)
        .await
        .with_context(|| format!("{} teardown failed", benchmark.name()));
    let exporter_teardown = exporter.teardown().await.context("Exporter teardown failed");

    if outcome.is_err() {
        for result in [&benchmark_teardown, &exporter_teardown] {
            if let Err(e) = result {
                warn!(error = %format!("{:#}", e), "Teardown failed after an earlier error");
            }
        }
    }

    outcome.and(benchmark_teardown).and(exporter_teardown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    #[derive(Default)]
    struct Failures {
        setup: bool,
        run: bool,
        teardown: bool,
    }

    struct FakeBenchmark {
        log: Log,
        fail: Failures,
    }

    #[async_trait]
    impl Benchmark for FakeBenchmark {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn setup(&mut self, _config: &RunConfig) -> Result<()> {
            self.log.lock().unwrap().push("bench:setup");
            if self.fail.setup {
                anyhow::bail!("setup broke");
            }
            Ok(())
        }

        async fn run(&mut self, exporter: &mut dyn Exporter) -> Result<()> {
            self.log.lock().unwrap().push("bench:run");
            if self.fail.run {
                anyhow::bail!("run broke");
            }
            crate::output::marshal_and_export(exporter, &serde_json::json!({"ok": true})).await
        }

        async fn teardown(&mut self, _config: &RunConfig) -> Result<()> {
            self.log.lock().unwrap().push("bench:teardown");
            if self.fail.teardown {
                anyhow::bail!("teardown broke");
            }
            Ok(())
        }
    }

    struct FakeExporter {
        log: Log,
        unhealthy: bool,
    }

    #[async_trait]
    impl Exporter for FakeExporter {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn setup(&mut self, _config: &RunConfig) -> Result<()> {
            self.log.lock().unwrap().push("exp:setup");
            Ok(())
        }

        async fn healthcheck(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("exp:healthcheck");
            if self.unhealthy {
                anyhow::bail!("cluster down");
            }
            Ok(())
        }

        fn marshal(&mut self, document: &serde_json::Value) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(document)?)
        }

        async fn export(&mut self, _payload: Vec<u8>) -> Result<()> {
            self.log.lock().unwrap().push("exp:export");
            Ok(())
        }

        async fn teardown(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("exp:teardown");
            Ok(())
        }
    }

    fn fakes(fail: Failures, unhealthy: bool) -> (Log, FakeBenchmark, FakeExporter) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let bench = FakeBenchmark { log: log.clone(), fail };
        let exporter = FakeExporter { log: log.clone(), unhealthy };
        (log, bench, exporter)
    }

    #[tokio::test]
    async fn test_lifecycle_order() {
        let (log, mut bench, mut exporter) = fakes(Failures::default(), false);
        run_benchmark(&RunConfig::default(), &mut bench, &mut exporter).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "exp:setup",
                "exp:healthcheck",
                "bench:setup",
                "bench:run",
                "exp:export",
                "bench:teardown",
                "exp:teardown",
            ]
        );
    }

    #[tokio::test]
    async fn test_healthcheck_failure_still_tears_down() {
        let (log, mut bench, mut exporter) = fakes(Failures::default(), true);
        let err = run_benchmark(&RunConfig::default(), &mut bench, &mut exporter)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("cluster down"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["exp:setup", "exp:healthcheck", "bench:teardown", "exp:teardown"]
        );
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let fail = Failures {
            run: true,
            teardown: true,
            ..Default::default()
        };
        let (log, mut bench, mut exporter) = fakes(fail, false);
        let err = run_benchmark(&RunConfig::default(), &mut bench, &mut exporter)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("run broke"));
        assert!(log.lock().unwrap().ends_with(&["bench:teardown", "exp:teardown"]));
    }

    #[tokio::test]
    async fn test_teardown_error_reported_when_run_succeeds() {
        let fail = Failures {
            teardown: true,
            ..Default::default()
        };
        let (_log, mut bench, mut exporter) = fakes(fail, false);
        let err = run_benchmark(&RunConfig::default(), &mut bench, &mut exporter)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("teardown broke"));
    }

    #[test]
    fn test_run_metadata() {
        let config = RunConfig {
            run_id: "run-7".to_string(),
            ..Default::default()
        };
        let metadata = RunMetadata::new(&config, "uperf");
        assert_eq!(metadata.run_id, "run-7");
        assert_eq!(metadata.benchmark, "uperf");
        assert!(!metadata.hostname.is_empty());
        assert_eq!(metadata.version, env!("CARGO_PKG_VERSION"));
    }
}
