//! Benchmark process execution

use crate::util::time::{RunClock, RunWindow};
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Lines of stdout kept in the error when a command fails
const FAILURE_TAIL_LINES: usize = 20;

/// Captured result of one benchmark command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub window: RunWindow,
}

/// Executes a benchmark command line and captures its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as child processes
///
/// Stderr is inherited so the tool's own diagnostics reach the terminal.
/// When a timeout is set the child is killed once it expires.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, cmd: &[String]) -> Result<CommandOutput> {
        let (program, args) = cmd.split_first().context("Empty command line")?;
        let command_line = cmd.join(" ");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start `{}`", command_line))?;

        info!(cmd = %command_line, pid = child.id(), "Started benchmark process");
        let clock = RunClock::start();

        let output = match self.timeout {
            // Dropping the wait future drops the child, which kills it
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .with_context(|| format!("`{}` did not finish within {}s", command_line, limit.as_secs_f64()))?,
            None => child.wait_with_output().await,
        }
        .with_context(|| format!("Failed to wait for `{}`", command_line))?;

        let window = clock.stop();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(status = %output.status, bytes = stdout.len(), "Benchmark process exited");

        if !output.status.success() {
            anyhow::bail!(
                "`{}` failed with {}; last output:\n{}",
                command_line,
                output.status,
                tail(&stdout, FAILURE_TAIL_LINES)
            );
        }

        Ok(CommandOutput { stdout, window })
    }
}

/// Replays stdout captured from an earlier run
///
/// The command line is ignored; the window is pinned to the capture time.
#[derive(Debug, Clone)]
pub struct TranscriptRunner {
    stdout: String,
    captured_at: DateTime<Utc>,
}

impl TranscriptRunner {
    pub fn new(stdout: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            stdout: stdout.into(),
            captured_at,
        }
    }
}

#[async_trait]
impl CommandRunner for TranscriptRunner {
    async fn run(&self, _cmd: &[String]) -> Result<CommandOutput> {
        Ok(CommandOutput {
            stdout: self.stdout.clone(),
            window: RunWindow::at(self.captured_at),
        })
    }
}

/// Last `n` lines of `text`
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
