//! Speech-to-text engine invocation.
//!
//! The engine is an opaque command with the conventional whisper-style
//! interface: it takes a media path plus decoding parameters, prints one
//! timestamped segment per stdout line
//! (`[hh:mm:ss.mmm --> hh:mm:ss.mmm] text`), and writes an SRT file next
//! to the input. Progress is derived by mapping the latest segment end
//! time against the media duration.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::job::JobParameters;

/// Decoder defaults applied when a submission leaves a field unset.
pub const DEFAULT_MODEL: &str = "large-v3";
pub const DEFAULT_DEVICE: &str = "cuda";
pub const DEFAULT_LANGUAGE: &str = "auto";
pub const DEFAULT_BEAM_SIZE: u32 = 12;
pub const DEFAULT_COMPUTE_TYPE: &str = "float16";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[\d{2}:\d{2}:\d{2}[.,]\d{3} --> (\d{2}):(\d{2}):(\d{2})[.,](\d{3})\]")
            .unwrap()
    })
}

/// Builds the engine command for a media file.
pub fn transcribe_command(engine: &Path, input: &Path, params: &JobParameters) -> Command {
    let mut cmd = Command::new(engine);
    cmd.arg(input)
        .arg("--model")
        .arg(params.model.as_deref().unwrap_or(DEFAULT_MODEL))
        .arg("--device")
        .arg(params.device.as_deref().unwrap_or(DEFAULT_DEVICE))
        .arg("--beam-size")
        .arg(params.beam_size.unwrap_or(DEFAULT_BEAM_SIZE).to_string())
        .arg("--compute-type")
        .arg(params.compute_type.as_deref().unwrap_or(DEFAULT_COMPUTE_TYPE))
        .arg("--temperature")
        .arg(params.temperature.unwrap_or(DEFAULT_TEMPERATURE).to_string())
        .arg("--output-format")
        .arg("srt");

    let language = params.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
    if language != "auto" {
        cmd.arg("--language").arg(language);
    }
    if params.vad_filter.unwrap_or(false) {
        cmd.arg("--vad-filter");
    }
    if let Some(track) = params.audio_track {
        cmd.arg("--audio-track").arg(track.to_string());
    }
    if let Some(workers) = params.workers {
        cmd.arg("--workers").arg(workers.to_string());
    }

    cmd
}

/// Parses the segment end time (in seconds) from an engine output line.
pub fn parse_segment_end(line: &str) -> Option<f64> {
    let captures = segment_re().captures(line)?;
    let hours: f64 = captures.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = captures.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = captures.get(3)?.as_str().parse().ok()?;
    let millis: f64 = captures.get(4)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds + millis / 1000.0)
}

/// Where the engine writes its subtitle output for a given input.
pub fn srt_output_path(input: &Path) -> PathBuf {
    input.with_extension("srt")
}
