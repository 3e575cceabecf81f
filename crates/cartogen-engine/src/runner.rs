//! Subprocess supervision for the cartogram binary.
//!
//! The child's stdout carries one JSON document; stderr carries the progress
//! protocol. Both pipes are drained by dedicated tasks into one channel so
//! neither OS buffer can fill while the parent waits on the other, the
//! classic two-pipe deadlock. Completion is signaled by the senders
//! dropping.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;

use cartogen_core::models::{EngineOutput, GenerationRequest};
use cartogen_core::{CartogenError, Result};
use cartogen_store::{MemoryProgressStore, ProgressStore};

use crate::command::EngineCommand;
use crate::progress::ProgressTracker;
use crate::protocol::EngineLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stdout,
    Stderr,
}

/// Runs the external geometry engine.
#[derive(Debug, Clone)]
pub struct EngineRunner {
    binary: PathBuf,
    timeout: Duration,
    area_error_threshold: f64,
    data_roots: Vec<PathBuf>,
}

impl EngineRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(300),
            area_error_threshold: 0.01,
            data_roots: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_area_error_threshold(mut self, threshold: f64) -> Self {
        self.area_error_threshold = threshold;
        self
    }

    /// Confine boundary and area-data paths to these roots. Empty means
    /// unconfined.
    pub fn with_data_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.data_roots = roots;
        self
    }

    /// Run one generation without progress reporting.
    pub async fn run_detached(&self, request: &GenerationRequest) -> Result<Option<EngineOutput>> {
        self.run::<MemoryProgressStore>(request, None).await
    }

    /// Run one generation to completion.
    ///
    /// Returns `Ok(None)` when the engine exits cleanly with empty stdout
    /// and no ERROR line, which callers treat as "nothing to do" rather
    /// than a failure. An ERROR line surfaces as [`CartogenError::Engine`]
    /// only after the process has fully exited, so diagnostics are
    /// complete. On timeout the child is force-killed and buffered output
    /// is still drained before [`CartogenError::EngineTimeout`] is raised.
    pub async fn run<S: ProgressStore>(
        &self,
        request: &GenerationRequest,
        mut progress: Option<&mut ProgressTracker<'_, S>>,
    ) -> Result<Option<EngineOutput>> {
        let command = EngineCommand::build(&self.binary, request, &self.data_roots)?;
        tracing::debug!(binary = %command.binary().display(), args = ?command.args(), "spawning engine");

        let mut child = Command::new(command.binary())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| CartogenError::Engine {
            message: "stdout pipe unavailable".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| CartogenError::Engine {
            message: "stderr pipe unavailable".to_string(),
        })?;

        let (tx, mut rx) = mpsc::channel::<(Source, String)>(64);
        tokio::spawn(drain(stdout, Source::Stdout, tx.clone()));
        tokio::spawn(drain(stderr, Source::Stderr, tx));

        let deadline = Instant::now() + self.timeout;
        let mut timed_out = false;
        let mut stdout_buf = String::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut worst_area_error: Option<(f64, String)> = None;
        let mut error_message: Option<String> = None;

        loop {
            let next = if timed_out {
                // Keep flushing whatever the readers buffered before the kill
                rx.recv().await
            } else {
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(item) => item,
                    Err(_) => {
                        timed_out = true;
                        child.start_kill()?;
                        continue;
                    }
                }
            };
            let Some((source, line)) = next else { break };

            match source {
                Source::Stdout => stdout_buf.push_str(&line),
                Source::Stderr => {
                    if let Some(tracker) = progress.as_deref_mut() {
                        tracker.append_stderr(&line);
                    }
                    match EngineLine::parse(&line) {
                        EngineLine::Progress(value) => {
                            if let Some(tracker) = progress.as_deref_mut() {
                                tracker.publish(value).await?;
                            }
                        }
                        EngineLine::AreaError { factor, region } => {
                            let is_worse = worst_area_error
                                .as_ref()
                                .map_or(true, |(current, _)| factor > *current);
                            if is_worse {
                                worst_area_error = Some((factor, region));
                            }
                        }
                        EngineLine::Warning(text) => warnings.push(text),
                        EngineLine::Error(text) => error_message = Some(text),
                        EngineLine::Other(_) => {}
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            tracing::warn!(?status, "engine exited with non-zero status");
        }

        if timed_out {
            tracing::error!(seconds = self.timeout.as_secs(), "engine timed out, killed");
            return Err(CartogenError::EngineTimeout { seconds: self.timeout.as_secs() });
        }
        if let Some(message) = error_message {
            return Err(CartogenError::Engine { message });
        }
        if stdout_buf.trim().is_empty() {
            return Ok(None);
        }

        let document: serde_json::Value = serde_json::from_str(&stdout_buf)?;
        let mut output = EngineOutput::from_document(document);
        output.warnings = warnings;
        if let Some(notice) =
            area_error_notice(&output.warnings, &worst_area_error, self.area_error_threshold)
        {
            output.warnings.push(notice);
        }
        Ok(Some(output))
    }
}

async fn drain<R>(pipe: R, source: Source, tx: mpsc::Sender<(Source, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send((source, line)).await.is_err() {
            break;
        }
    }
}

/// When warnings were emitted and the worst recorded area error exceeds the
/// threshold, synthesize a summary naming the worst region and how far off
/// its rendered area is.
fn area_error_notice(
    warnings: &[String],
    worst: &Option<(f64, String)>,
    threshold: f64,
) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let (factor, region) = worst.as_ref()?;
    if *factor <= threshold {
        return None;
    }
    Some(format!(
        "The largest area error is in {region}, which is rendered at {:.1}% of its ideal area.",
        (1.0 + factor) * 100.0
    ))
}
