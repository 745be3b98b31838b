//! Event ingestion via an external command.
//!
//! The ingestion script lives outside this service; we only launch it,
//! forward its output into our logs, and judge it by its exit status.

use crate::suggestions::traits::IngestionTrigger;
use crate::utils::fmt_duration;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs a configured command line to repopulate the event table.
#[derive(Debug, Clone)]
pub struct CommandIngestor {
    program: String,
    args: Vec<String>,
}

impl CommandIngestor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `tsx scripts/ingest.ts`.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .context("ingestion command must not be empty")?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl IngestionTrigger for CommandIngestor {
    async fn ingest(&self) -> Result<()> {
        let start = Instant::now();
        debug!(program = %self.program, args = ?self.args, "Spawning ingestion command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn ingestion command `{}`", self.program))?;

        let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, false)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, true)));

        let status = child
            .wait()
            .await
            .context("failed to wait for ingestion command")?;

        for handle in [stdout, stderr].into_iter().flatten() {
            let _ = handle.await;
        }

        if !status.success() {
            bail!("ingestion command exited with {status}");
        }

        info!(elapsed = fmt_duration(start.elapsed()), "Ingestion command finished");
        Ok(())
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) if is_stderr => warn!(output = %line.trim(), "ingest stderr"),
            Ok(Some(line)) => info!(output = %line.trim(), "ingest stdout"),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading ingestion output");
                break;
            }
        }
    }
}
