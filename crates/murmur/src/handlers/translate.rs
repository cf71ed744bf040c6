//! Subtitle translation handler: reads an SRT file, translates its cue
//! text batch by batch through the external translator, and writes the
//! translated subtitle next to the source.

use std::path::PathBuf;

use tracing::info_span;

use crate::media::srt::{format_srt, parse_srt};
use crate::media::translator;

use super::{display_name, HandlerContext, HandlerError, HandlerOutcome};

const PROGRESS_FLOOR: f64 = 10.0;
const PROGRESS_SPAN: f64 = 0.85;

/// Output path for a translated subtitle: `talk.srt` -> `talk.en.srt`.
fn translated_path(input: &PathBuf, target_lang: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitle".to_string());
    input.with_file_name(format!("{}.{}.srt", stem, target_lang))
}

pub fn run(ctx: &HandlerContext<'_>) -> Result<HandlerOutcome, HandlerError> {
    let _span = info_span!("translate", job_id = %ctx.job.id).entered();

    let input = ctx.local_source()?;
    let target_lang = ctx
        .job
        .parameters
        .target_language
        .as_deref()
        .ok_or_else(|| HandlerError::Invalid("no target language given".to_string()))?;
    let source_lang = match ctx.job.parameters.source_language.as_deref() {
        None | Some("") | Some("default") => "auto",
        Some(lang) => lang,
    };

    // Subtitle files arrive in assorted encodings; decode what we can and
    // keep going.
    let raw = std::fs::read(&input).map_err(|e| HandlerError::Io {
        path: input.clone(),
        source: e,
    })?;
    let content = String::from_utf8_lossy(&raw);

    let mut cues = parse_srt(&content);
    if cues.is_empty() {
        return Err(HandlerError::Invalid(format!(
            "no subtitle cues found in {}",
            input.display()
        )));
    }

    ctx.check_cancelled()?;
    ctx.progress.report(
        PROGRESS_FLOOR as u8,
        &format!("Translating {} cue(s) to {}", cues.len(), target_lang),
    );

    let total = cues.len();
    let mut done = 0usize;
    for batch in cues.chunks_mut(translator::BATCH_SIZE) {
        ctx.check_cancelled()?;

        let texts: Vec<String> = batch.iter().map(|c| c.text()).collect();
        let translated = translator::translate_batch(
            &ctx.config.tools.translator,
            source_lang,
            target_lang,
            &texts,
        )?;
        for (cue, text) in batch.iter_mut().zip(translated) {
            cue.lines = vec![text];
        }

        done += batch.len();
        let percent = (PROGRESS_FLOOR + (done as f64 / total as f64) * 100.0 * PROGRESS_SPAN) as u8;
        ctx.progress.report(
            percent.min(99),
            &format!("Translated {} / {} cues", done, total),
        );
    }

    ctx.check_cancelled()?;

    let output = match ctx.job.parameters.output.as_deref() {
        Some(path) => PathBuf::from(path),
        None => translated_path(&input, target_lang),
    };
    std::fs::write(&output, format_srt(&cues)).map_err(|e| HandlerError::Io {
        path: output.clone(),
        source: e,
    })?;

    let summary = format!(
        "Translated {} cue(s) to {}\nSubtitle: {}",
        total,
        target_lang,
        display_name(&output)
    );
    Ok(HandlerOutcome::summary(summary))
}
