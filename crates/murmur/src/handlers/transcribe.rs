//! Transcription handler: runs the opaque speech-to-text engine over a
//! local media file, mapping its segment timestamps onto the media
//! duration for progress.

use tracing::info_span;

use crate::media::runner::run_streaming;
use crate::media::{probe, speech};

use super::{display_name, HandlerContext, HandlerError, HandlerOutcome};

/// Without a known duration, progress is reported every this many
/// segments instead.
const SEGMENT_REPORT_INTERVAL: u32 = 25;

pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    let _span = info_span!("transcribe", job_id = %ctx.job.id).entered();

    let input = ctx.local_source()?;

    ctx.check_cancelled()?;
    ctx.progress.report(0, "Preparing transcription");

    let duration = match probe::duration_secs(&ctx.config.tools.ffprobe, &input) {
        Ok(d) => d,
        Err(e) => {
            // Progress falls back to segment counting; not fatal.
            log::warn!("Could not probe duration of {}: {}", input.display(), e);
            None
        }
    };

    let mut segments = 0u32;
    let mut last_percent = 0u8;
    let cmd = speech::transcribe_command(&ctx.config.tools.speech_engine, &input, &ctx.job.parameters);

    run_streaming("speech engine", cmd, ctx.token, |line| {
        let Some(end) = speech::parse_segment_end(line) else {
            return;
        };
        segments += 1;
        match duration {
            Some(total) if total > 0.0 => {
                let percent = ((end / total) * 100.0).min(99.0) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    ctx.progress.report(
                        percent,
                        &format!("Transcribing: {:.0}s / {:.0}s", end, total),
                    );
                }
            }
            _ => {
                if segments % SEGMENT_REPORT_INTERVAL == 0 {
                    ctx.progress.report(
                        last_percent,
                        &format!("Transcribed {} segments", segments),
                    );
                }
            }
        }
    })?;

    ctx.check_cancelled()?;

    let srt = speech::srt_output_path(&input);
    let summary = format!(
        "Transcription complete: {} segment(s)\nSubtitle: {}",
        segments,
        display_name(&srt)
    );
    Ok(HandlerOutcome::summary(summary))
}
