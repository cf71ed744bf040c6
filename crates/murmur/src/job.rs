//! Core job model: the job entity, its closed type/status enums, and the
//! submission request with its synchronous validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

/// Kind of work a job performs. Fixed, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Download,
    Transcribe,
    Transcode,
    Translate,
    GenerateSubtitles,
}

impl JobType {
    /// Stable string form used for database storage and the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Download => "download",
            JobType::Transcribe => "transcribe",
            JobType::Transcode => "transcode",
            JobType::Translate => "translate",
            JobType::GenerateSubtitles => "generate_subtitles",
        }
    }

    /// Parses a stored string, falling back to `Transcribe` for unknown
    /// values written by an older build.
    pub fn parse(s: &str, job_id: &str) -> Self {
        match s {
            "download" => JobType::Download,
            "transcribe" => JobType::Transcribe,
            "transcode" => JobType::Transcode,
            "translate" => JobType::Translate,
            "generate_subtitles" => JobType::GenerateSubtitles,
            other => {
                log::warn!(
                    "Unknown job type '{}' for job {}, defaulting to transcribe",
                    other,
                    job_id
                );
                JobType::Transcribe
            }
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
///
/// The only legal path is `Queued -> Running -> {Completed | Failed |
/// Cancelled}`, with `Queued -> Cancelled` for jobs cancelled before
/// dispatch. Terminal states accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Stable string form used for database storage and the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored string, defaulting unknown values to `Queued`.
    pub fn parse(s: &str, job_id: &str) -> Self {
        match s {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            other => {
                log::warn!(
                    "Unknown job status '{}' for job {}, defaulting to queued",
                    other,
                    job_id
                );
                JobStatus::Queued
            }
        }
    }

    /// Completed, failed and cancelled jobs accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// The single non-terminal predicate shared by the executor, the
    /// reconciler and the adaptive poller.
    pub fn is_non_terminal(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether a transition from `self` to `to` follows a legal edge of
    /// the state machine.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        match (self, to) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Queued, JobStatus::Cancelled) => true,
            (JobStatus::Running, JobStatus::Completed) => true,
            (JobStatus::Running, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters captured at submission time. Immutable for the lifetime of
/// the job; stored as JSON in the ledger.
///
/// Which fields are meaningful depends on the job type; unused fields stay
/// `None` and are dropped from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobParameters {
    /// Source locator: an http(s) URL for downloads, a local path or
    /// `file://` locator for everything else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Display title, extracted from the URL or filename at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Speech engine model name (tiny / small / medium / large-v2 / large-v3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Compute device for the speech engine (cuda / cpu).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Spoken language code, or "auto" to detect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Beam size for the speech engine decoder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_size: Option<u32>,
    /// External tool parallelism for this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
    /// Voice-activity-detection filter toggle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vad_filter: Option<bool>,
    /// Speech engine compute type (float16 / float32 / int8_float16).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_type: Option<String>,
    /// Sampling temperature for the speech engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Audio track index to transcribe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_track: Option<u32>,
    /// Target language for subtitle translation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    /// Source language for subtitle translation, or "auto".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    /// Explicit output path for transcode/translate jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl JobParameters {
    /// Resolves the source locator to a local filesystem path, stripping a
    /// `file://` prefix when present.
    pub fn source_path(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(|s| s.strip_prefix("file://").unwrap_or(s))
    }
}

/// The central entity: one unit of orchestrated work tracked end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Opaque unique identifier, assigned at creation, immutable. Never
    /// reused, even after deletion.
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Percentage 0-100. Non-decreasing while running; meaningless once
    /// terminal.
    pub progress: u8,
    pub parameters: JobParameters,
    /// Accumulating log/output text. Append-only while running, frozen at
    /// terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Populated only on failure. Always a human-readable message, never a
    /// raw stack trace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a fresh queued job with a new unique id.
    pub fn new(job_type: JobType, parameters: JobParameters) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Queued,
            progress: 0,
            parameters,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A submission: the only way user-facing code creates jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJobRequest {
    pub job_type: JobType,
    #[serde(default)]
    pub parameters: JobParameters,
}

impl NewJobRequest {
    pub fn new(job_type: JobType, parameters: JobParameters) -> Self {
        Self {
            job_type,
            parameters,
        }
    }

    /// Validates the submission before any ledger row exists. Rejections
    /// here surface synchronously to the caller.
    pub fn validate(&self) -> Result<(), SubmitError> {
        let p = &self.parameters;
        let source = p.source.as_deref().map(str::trim).unwrap_or("");
        if source.is_empty() {
            return Err(SubmitError::MissingParameter { name: "source" });
        }

        match self.job_type {
            JobType::Download => {
                if !source.starts_with("http://") && !source.starts_with("https://") {
                    return Err(SubmitError::InvalidParameter {
                        name: "source",
                        reason: "download jobs require an http(s) URL".to_string(),
                    });
                }
            }
            JobType::Translate => {
                let target = p.target_language.as_deref().map(str::trim).unwrap_or("");
                if target.is_empty() {
                    return Err(SubmitError::MissingParameter {
                        name: "target_language",
                    });
                }
            }
            JobType::Transcribe | JobType::Transcode | JobType::GenerateSubtitles => {}
        }

        if let Some(beam) = p.beam_size {
            if !(1..=25).contains(&beam) {
                return Err(SubmitError::InvalidParameter {
                    name: "beam_size",
                    reason: format!("must be between 1 and 25, got {}", beam),
                });
            }
        }
        if let Some(workers) = p.workers {
            if !(1..=8).contains(&workers) {
                return Err(SubmitError::InvalidParameter {
                    name: "workers",
                    reason: format!("must be between 1 and 8, got {}", workers),
                });
            }
        }
        if let Some(temp) = p.temperature {
            if !(0.0..=1.0).contains(&temp) {
                return Err(SubmitError::InvalidParameter {
                    name: "temperature",
                    reason: format!("must be between 0.0 and 1.0, got {}", temp),
                });
            }
        }

        Ok(())
    }
}

/// A partial mutation applied through the ledger. Everything a handler or
/// the executor may change about a job after creation.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    /// A chunk of output text to append to the accumulating `result`.
    pub result_append: Option<String>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Patch for a normal in-flight progress report.
    pub fn progress(percent: u8, message: &str) -> Self {
        Self {
            progress: Some(percent),
            result_append: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Patch for a successful completion.
    pub fn completed(summary: &str) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result_append: Some(summary.to_string()),
            ..Default::default()
        }
    }

    /// Patch for a failure with a human-readable message.
    pub fn failed(error: &str) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Patch for a user-requested cancellation. Not a failure: no error is
    /// recorded.
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Cancelled),
            ..Default::default()
        }
    }
}
