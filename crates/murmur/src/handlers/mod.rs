//! Job type handlers: one procedure per job kind, wrapping an external
//! tool invocation with standardized progress reporting and cancellation
//! checks.
//!
//! Every handler is a function of (job parameters, progress sink,
//! cancellation token) to a result summary. Handlers must report progress
//! at bounded intervals when the tool exposes it, translate tool failures
//! into a single human-readable message, and observe the token before and
//! after each external invocation. Handlers are idempotent-safe to
//! re-invoke as a fresh job; restart is always a brand-new submission,
//! never a resume.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::config::MurmurConfig;
use crate::executor::cancel::CancelToken;
use crate::job::{Job, JobPatch, JobType, NewJobRequest};
use crate::ledger::JobLedger;
use crate::media::ToolError;

pub mod download;
pub mod subtitles;
pub mod transcode;
pub mod transcribe;
pub mod translate;

/// Errors surfaced by a handler. Caught at the executor boundary and
/// recorded on the job; never allowed to crash the process.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The job's cancellation token fired. Not a failure.
    #[error("cancelled by user")]
    Cancelled,

    #[error("{0}")]
    Tool(ToolError),

    /// The job's inputs are unusable (missing file, bad locator).
    #[error("{0}")]
    Invalid(String),

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ToolError> for HandlerError {
    fn from(e: ToolError) -> Self {
        match e {
            // A kill triggered by the token surfaces as cancellation, not
            // as a tool failure.
            ToolError::Interrupted { .. } => HandlerError::Cancelled,
            other => HandlerError::Tool(other),
        }
    }
}

/// What a handler hands back to the executor.
#[derive(Debug, Default)]
pub struct HandlerOutcome {
    /// Human-readable completion summary appended to the job's result.
    pub summary: String,
    /// Jobs to submit on success. Only the download handler uses this —
    /// the one place jobs are created programmatically.
    pub followups: Vec<NewJobRequest>,
}

impl HandlerOutcome {
    pub fn summary(text: String) -> Self {
        Self {
            summary: text,
            followups: Vec::new(),
        }
    }
}

/// Receives incremental progress from a running handler.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, message: &str);
}

/// No-op sink for unit tests.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Production sink: writes progress through the ledger (which broadcasts)
/// and mirrors each line into the job's dedicated log file.
pub struct LedgerProgress {
    ledger: Arc<JobLedger>,
    job_id: String,
    log_path: Option<PathBuf>,
}

impl LedgerProgress {
    pub fn new(ledger: Arc<JobLedger>, job_id: &str, log_path: Option<PathBuf>) -> Self {
        if let Some(ref path) = log_path {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    log::warn!("Failed to create job log dir {}: {}", parent.display(), e);
                }
            }
        }
        Self {
            ledger,
            job_id: job_id.to_string(),
            log_path,
        }
    }

    /// Appends a line to the job log without touching the ledger. Used by
    /// the executor for lifecycle markers.
    pub fn log_line(&self, message: &str) {
        let Some(ref path) = self.log_path else {
            return;
        };
        let line = format!("{} | {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"), message);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            log::debug!("Failed to append job log {}: {}", path.display(), e);
        }
    }
}

impl ProgressSink for LedgerProgress {
    fn report(&self, percent: u8, message: &str) {
        self.ledger
            .update(&self.job_id, JobPatch::progress(percent, message));
        self.log_line(&format!("[{:3}%] {}", percent, message));
    }
}

/// Everything a handler needs to do its work.
pub struct HandlerContext<'a> {
    pub job: &'a Job,
    pub config: &'a MurmurConfig,
    pub progress: &'a dyn ProgressSink,
    pub token: &'a CancelToken,
}

impl HandlerContext<'_> {
    /// Cancellation checkpoint. Handlers call this before and after each
    /// external tool invocation.
    pub fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.token.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves the job's source locator to an existing local media path.
    pub fn local_source(&self) -> Result<PathBuf, HandlerError> {
        let source = self
            .job
            .parameters
            .source_path()
            .ok_or_else(|| HandlerError::Invalid("no source file given".to_string()))?;
        if source.starts_with("http://") || source.starts_with("https://") {
            return Err(HandlerError::Invalid(
                "remote sources must be submitted as download jobs".to_string(),
            ));
        }
        let path = PathBuf::from(source);
        if !path.exists() {
            return Err(HandlerError::Invalid(format!(
                "media file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// File name shown in summaries.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Dispatches a job to its handler.
pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    match ctx.job.job_type {
        JobType::Download => download::run(ctx),
        JobType::Transcribe => transcribe::run(ctx),
        JobType::Transcode => transcode::run(ctx),
        JobType::Translate => translate::run(ctx),
        JobType::GenerateSubtitles => subtitles::run(ctx),
    }
}
