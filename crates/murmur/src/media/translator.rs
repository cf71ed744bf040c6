//! Subtitle text translation through an external translator command.
//!
//! The translator reads one source line per stdin line and writes one
//! translated line per stdout line (`trans -b` compatible). When the tool
//! returns fewer lines than it was given, the missing cues keep their
//! original text rather than failing the whole job.

use std::path::Path;
use std::process::Command;

use super::runner::run_with_input;
use super::ToolError;

/// Cues are translated in batches to keep individual tool invocations
/// short enough to report progress between them.
pub const BATCH_SIZE: usize = 25;

fn translate_command(translator: &Path, source_lang: &str, target_lang: &str) -> Command {
    let mut cmd = Command::new(translator);
    cmd.arg("-b");
    if source_lang != "auto" && !source_lang.is_empty() {
        cmd.arg("-s").arg(source_lang);
    }
    cmd.arg("-t").arg(target_lang);
    cmd
}

/// Translates a batch of lines. Output lines map 1:1 onto input lines;
/// shortfalls fall back to the original text.
pub fn translate_batch(
    translator: &Path,
    source_lang: &str,
    target_lang: &str,
    lines: &[String],
) -> Result<Vec<String>, ToolError> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let mut input = lines.join("\n");
    input.push('\n');

    let cmd = translate_command(translator, source_lang, target_lang);
    let output = run_with_input("translator", cmd, &input)?;

    let mut translated: Vec<String> = output.lines().map(|l| l.to_string()).collect();
    if translated.len() < lines.len() {
        log::warn!(
            "Translator returned {} line(s) for {} input(s), keeping originals for the rest",
            translated.len(),
            lines.len()
        );
        for original in lines.iter().skip(translated.len()) {
            translated.push(original.clone());
        }
    }
    translated.truncate(lines.len());

    Ok(translated)
}
