//! Elasticsearch bulk exporter
//!
//! Exported documents are queued to a background worker that batches them
//! into NDJSON `_bulk` requests. A batch is sent when the buffered size
//! reaches `flush_bytes`, when `flush_interval_secs` passes, or on teardown.
//! Throttled and unavailable responses (429, 502, 503, 504) and transport
//! errors are retried with binary exponential backoff.

use super::Exporter;
use crate::config::{ElasticsearchConfig, RunConfig};
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Documents waiting in the channel before `export` blocks
const QUEUE_DEPTH: usize = 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the wait between bulk retries
const MAX_BACKOFF: Duration = Duration::from_secs(60);

const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Counters reported by the bulk worker when it stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkSummary {
    pub requests: usize,
    pub indexed: usize,
    pub failed: usize,
}

pub struct ElasticsearchExporter {
    config: ElasticsearchConfig,
    client: Option<reqwest::Client>,
    sender: Option<mpsc::Sender<Vec<u8>>>,
    worker: Option<JoinHandle<Result<BulkSummary>>>,
    server_version: Option<String>,
    summary: Option<BulkSummary>,
}

impl ElasticsearchExporter {
    pub fn new(config: ElasticsearchConfig) -> Self {
        Self {
            config,
            client: None,
            sender: None,
            worker: None,
            server_version: None,
            summary: None,
        }
    }

    /// Version reported by the cluster during the healthcheck
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Worker counters, available after teardown
    pub fn summary(&self) -> Option<BulkSummary> {
        self.summary
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }
}

#[async_trait]
impl Exporter for ElasticsearchExporter {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn setup(&mut self, _config: &RunConfig) -> Result<()> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.config.skip_verify)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Elasticsearch HTTP client")?;

        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        let worker = BulkWorker {
            client: client.clone(),
            bulk_url: format!("{}/{}/_bulk", self.base_url(), self.config.index),
            flush_interval: Duration::from_secs(self.config.flush_interval_secs),
            flush_bytes: self.config.flush_bytes,
            max_retries: self.config.max_retries,
            backoff_base: Duration::from_millis(self.config.backoff_base_ms),
            buffer: Vec::new(),
            buffered_docs: 0,
            summary: BulkSummary::default(),
        };

        self.client = Some(client);
        self.sender = Some(sender);
        self.worker = Some(tokio::spawn(worker.run(receiver)));

        info!(url = %self.config.url, index = %self.config.index, "Created Elasticsearch exporter");
        Ok(())
    }

    async fn healthcheck(&mut self) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .context("Elasticsearch healthcheck called before setup")?;

        let response = client
            .get(self.base_url())
            .send()
            .await
            .with_context(|| format!("Elasticsearch healthcheck failed: cannot reach {}", self.config.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Elasticsearch healthcheck failed: {} {}", status, body);
        }

        let info: ClusterInfo = response
            .json()
            .await
            .context("Elasticsearch healthcheck failed: unable to decode cluster info")?;

        info!(server_version = %info.version.number, "Elasticsearch healthcheck succeeded");
        self.server_version = Some(info.version.number);
        Ok(())
    }

    fn marshal(&mut self, document: &serde_json::Value) -> Result<Vec<u8>> {
        serde_json::to_vec(document).context("Failed to encode document for Elasticsearch")
    }

    async fn export(&mut self, payload: Vec<u8>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .context("Elasticsearch export called before setup")?;

        if sender.send(payload).await.is_err() {
            // The worker only drops its receiver when it fails; teardown reports why
            anyhow::bail!("Elasticsearch bulk worker stopped accepting documents");
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        self.sender.take();

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let summary = worker.await.context("Elasticsearch bulk worker panicked")??;
        info!(
            requests = summary.requests,
            indexed = summary.indexed,
            failed = summary.failed,
            "Elasticsearch exporter finished"
        );
        self.summary = Some(summary);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ClusterInfo {
    version: ClusterVersion,
}

#[derive(Debug, Deserialize)]
struct ClusterVersion {
    number: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    error: Option<BulkItemError>,
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Background task owning the NDJSON buffer
struct BulkWorker {
    client: reqwest::Client,
    bulk_url: String,
    flush_interval: Duration,
    flush_bytes: usize,
    max_retries: u32,
    backoff_base: Duration,
    buffer: Vec<u8>,
    buffered_docs: usize,
    summary: BulkSummary,
}

impl BulkWorker {
    async fn run(mut self, mut receiver: mpsc::Receiver<Vec<u8>>) -> Result<BulkSummary> {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                document = receiver.recv() => match document {
                    Some(document) => {
                        self.push(&document);
                        if self.buffer.len() >= self.flush_bytes {
                            self.flush().await?;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush().await?;
                }
            }
        }

        self.flush().await?;
        Ok(self.summary)
    }

    fn push(&mut self, document: &[u8]) {
        self.buffer.extend_from_slice(b"{\"index\":{}}\n");
        self.buffer.extend_from_slice(document);
        self.buffer.push(b'\n');
        self.buffered_docs += 1;
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffered_docs == 0 {
            return Ok(());
        }

        let body = std::mem::take(&mut self.buffer);
        let docs = std::mem::replace(&mut self.buffered_docs, 0);
        debug!(documents = docs, bytes = body.len(), "Flushing bulk request");

        let response = self.send_with_retry(body).await?;
        self.summary.requests += 1;
        self.record_items(docs, response);
        Ok(())
    }

    async fn send_with_retry(&self, body: Vec<u8>) -> Result<BulkResponse> {
        let mut attempt: u32 = 0;
        loop {
            let result = self
                .client
                .post(&self.bulk_url)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body.clone())
                .send()
                .await;

            let retry_reason = match result {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<BulkResponse>()
                        .await
                        .context("Unable to decode bulk response");
                }
                Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                    format!("status {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Bulk request to {} failed: {} {}", self.bulk_url, status, text);
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                anyhow::bail!(
                    "Bulk request to {} failed after {} retries: {}",
                    self.bulk_url,
                    attempt,
                    retry_reason
                );
            }

            let delay = backoff_delay(self.backoff_base, attempt);
            warn!(attempt = attempt + 1, reason = %retry_reason, delay_ms = delay.as_millis() as u64, "Retrying bulk request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn record_items(&mut self, docs: usize, response: BulkResponse) {
        if !response.errors {
            self.summary.indexed += docs;
            return;
        }

        let mut failed = 0;
        for item in response.items.iter().flat_map(|entry| entry.values()) {
            if let Some(ref error) = item.error {
                failed += 1;
                warn!(
                    status = item.status,
                    error_type = %error.kind,
                    error_reason = error.reason.as_deref().unwrap_or(""),
                    "Elasticsearch rejected a document"
                );
            }
        }
        self.summary.failed += failed;
        self.summary.indexed += docs.saturating_sub(failed);
    }
}

/// `base * 2^attempt`, capped at [`MAX_BACKOFF`]
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32
        .checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}
