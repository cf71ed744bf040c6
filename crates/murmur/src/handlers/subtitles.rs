//! Subtitle generation handler: runs the speech engine over an existing
//! media file (with an explicit audio track) and verifies the SRT it
//! writes next to the source.

use tracing::info_span;

use crate::media::runner::run_streaming;
use crate::media::{probe, speech, ToolError};

use super::{display_name, HandlerContext, HandlerError, HandlerOutcome};

pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    let _span = info_span!("generate_subtitles", job_id = %ctx.job.id).entered();

    let input = ctx.local_source()?;
    let track = ctx.job.parameters.audio_track.unwrap_or(0);

    ctx.check_cancelled()?;
    ctx.progress
        .report(0, &format!("Generating subtitles from audio track {}", track));

    let duration = match probe::duration_secs(&ctx.config.tools.ffprobe, &input) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Could not probe duration of {}: {}", input.display(), e);
            None
        }
    };

    let mut params = ctx.job.parameters.clone();
    params.audio_track = Some(track);

    let mut segments = 0u32;
    let mut last_percent = 0u8;
    let cmd = speech::transcribe_command(&ctx.config.tools.speech_engine, &input, &params);

    run_streaming("speech engine", cmd, ctx.token, |line| {
        let Some(end) = speech::parse_segment_end(line) else {
            return;
        };
        segments += 1;
        if let Some(total) = duration.filter(|d| *d > 0.0) {
            let percent = ((end / total) * 100.0).min(99.0) as u8;
            if percent > last_percent {
                last_percent = percent;
                ctx.progress
                    .report(percent, &format!("Generating: {:.0}s / {:.0}s", end, total));
            }
        }
    })?;

    ctx.check_cancelled()?;

    let srt = speech::srt_output_path(&input);
    if !srt.exists() {
        return Err(HandlerError::Tool(ToolError::Malformed {
            tool: "speech engine".to_string(),
            detail: format!("no subtitle file produced at {}", srt.display()),
        }));
    }

    let summary = format!(
        "Subtitles generated: {} segment(s)\nSubtitle: {}",
        segments,
        display_name(&srt)
    );
    Ok(HandlerOutcome::summary(summary))
}
