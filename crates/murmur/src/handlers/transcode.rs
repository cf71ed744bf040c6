//! Transcode handler: converts a video to browser-playable MP4 through
//! the external media tool, parsing its machine-readable progress stream.

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info_span;

use crate::media::probe;
use crate::media::runner::run_streaming;

use super::{display_name, HandlerContext, HandlerError, HandlerOutcome};

// The tool's own work is mapped into this progress band; the edges are
// reserved for setup and the executor's final completion write.
const PROGRESS_FLOOR: f64 = 10.0;
const PROGRESS_SPAN: f64 = 0.85;

fn out_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"out_time_ms=(\d+)").unwrap())
}

/// Maps an `out_time_ms` value against the media duration into the
/// handler's progress band.
fn map_progress(out_time_ms: u64, duration_secs: f64) -> u8 {
    let elapsed = out_time_ms as f64 / 1_000_000.0;
    let percent = ((elapsed / duration_secs) * 100.0).min(99.0);
    (PROGRESS_FLOOR + percent * PROGRESS_SPAN) as u8
}

/// Parses an `out_time_ms=` progress line.
pub(crate) fn parse_out_time_ms(line: &str) -> Option<u64> {
    out_time_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    let _span = info_span!("transcode", job_id = %ctx.job.id).entered();

    let input = ctx.local_source()?;
    let output = match ctx.job.parameters.output.as_deref() {
        Some(path) => PathBuf::from(path),
        None => input.with_extension("mp4"),
    };
    if output == input {
        return Err(HandlerError::Invalid(format!(
            "transcode output would overwrite the input: {}",
            input.display()
        )));
    }

    let duration = match probe::duration_secs(&ctx.config.tools.ffprobe, &input) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Could not probe duration of {}: {}", input.display(), e);
            None
        }
    };

    ctx.check_cancelled()?;
    ctx.progress.report(5, "Starting transcode");

    let mut cmd = Command::new(&ctx.config.tools.ffmpeg);
    cmd.arg("-y")
        .arg("-i")
        .arg(&input)
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg("medium")
        .arg("-crf")
        .arg("23")
        .arg("-c:a")
        .arg("aac")
        .arg("-b:a")
        .arg("128k")
        .arg("-movflags")
        .arg("+faststart")
        .arg("-progress")
        .arg("pipe:1")
        .arg("-nostats")
        .arg(&output);

    let mut last_percent = 5u8;
    run_streaming("media tool", cmd, ctx.token, |line| {
        let Some(out_time) = parse_out_time_ms(line) else {
            return;
        };
        let Some(total) = duration.filter(|d| *d > 0.0) else {
            return;
        };
        let percent = map_progress(out_time, total);
        if percent > last_percent {
            last_percent = percent;
            ctx.progress.report(
                percent,
                &format!(
                    "Transcoding: {:.1}s / {:.1}s",
                    out_time as f64 / 1_000_000.0,
                    total
                ),
            );
        }
    })?;

    ctx.check_cancelled()?;

    let size_mb = std::fs::metadata(&output)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .map_err(|e| HandlerError::Io {
            path: output.clone(),
            source: e,
        })?;

    let summary = format!(
        "Transcode complete\nOutput: {} ({:.2} MB)",
        display_name(&output),
        size_mb
    );
    Ok(HandlerOutcome::summary(summary))
}
