//! Download handler: fetches a remote video (or playlist) through the
//! external downloader and queues one transcription job per produced
//! media file — the one place the system creates jobs programmatically.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info_span;

use crate::job::{JobParameters, JobType, NewJobRequest};
use crate::media::downloader;
use crate::media::runner::run_streaming;

use super::{display_name, HandlerContext, HandlerError, HandlerOutcome};

fn video_id_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[[A-Za-z0-9_-]{11}\]$").unwrap())
}

/// Derives a display title from a produced file, stripping the trailing
/// video-id tag the downloader appends.
pub(crate) fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = video_id_suffix_re().replace(&stem, "").trim().to_string();
    if cleaned.is_empty() {
        "Downloaded Video".to_string()
    } else {
        cleaned
    }
}

pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    let _span = info_span!("download", job_id = %ctx.job.id).entered();

    let url = ctx
        .job
        .parameters
        .source
        .as_deref()
        .ok_or_else(|| HandlerError::Invalid("no source URL given".to_string()))?;

    let download_dir = &ctx.config.directories.download_dir;
    std::fs::create_dir_all(download_dir).map_err(|e| HandlerError::Io {
        path: download_dir.clone(),
        source: e,
    })?;

    ctx.check_cancelled()?;
    ctx.progress.report(0, "Starting download");

    let mut files = Vec::new();
    let mut last_percent = 0u8;
    let cmd = downloader::download_command(&ctx.config.tools.downloader, download_dir, url);

    run_streaming("downloader", cmd, ctx.token, |line| {
        if let Some(percent) = downloader::parse_progress(line) {
            let percent = percent.min(99.0) as u8;
            if percent > last_percent {
                last_percent = percent;
                ctx.progress
                    .report(percent, &format!("Downloading: {}%", percent));
            }
        }
        if let Some(path) = downloader::parse_produced_file(line) {
            if downloader::is_media_file(&path) && !files.contains(&path) {
                log::info!("Downloader produced {}", path.display());
                files.push(path);
            }
        }
    })?;

    ctx.check_cancelled()?;

    files.retain(|f| f.exists());
    if files.is_empty() {
        // The parser may not recognise every output format; fall back to
        // scanning the download directory for fresh media.
        files = downloader::recent_media_files(download_dir);
        log::info!(
            "No files parsed from downloader output, scan found {}",
            files.len()
        );
    }

    let followups: Vec<NewJobRequest> = files
        .iter()
        .map(|path| {
            NewJobRequest::new(
                JobType::Transcribe,
                JobParameters {
                    source: Some(path.display().to_string()),
                    title: Some(title_from_path(path)),
                    ..ctx.job.parameters.clone()
                },
            )
        })
        .collect();

    let mut summary = format!("Download complete: {} file(s)", files.len());
    for path in &files {
        summary.push('\n');
        summary.push_str(&display_name(path));
    }
    if !followups.is_empty() {
        summary.push_str(&format!(
            "\nQueued {} transcription job(s)",
            followups.len()
        ));
    }

    Ok(HandlerOutcome { summary, followups })
}
