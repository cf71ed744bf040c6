//! Media probing: audio track enumeration and duration queries through
//! the external probe tool's JSON interface.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::runner::run_capture;
use super::ToolError;

/// One audio stream discovered in a media file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    /// Stream index within the container.
    pub index: u32,
    pub codec: String,
    pub channels: u32,
    pub sample_rate: u32,
    /// ISO language tag, "und" when untagged.
    pub language: String,
    pub title: String,
    /// Human-readable label for selection UIs.
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: Option<u32>,
    codec_name: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Enumerates the audio tracks of a media file.
pub fn audio_tracks(ffprobe: &Path, media: &Path) -> Result<Vec<AudioTrack>, ToolError> {
    if !media.exists() {
        return Err(ToolError::MissingFile(media.to_path_buf()));
    }

    let mut cmd = Command::new(ffprobe);
    cmd.arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("a")
        .arg("-show_entries")
        .arg("stream=index,codec_name,channels,sample_rate:stream_tags=language,title")
        .arg("-of")
        .arg("json")
        .arg(media);

    let json = run_capture("ffprobe", cmd)?;
    let parsed: ProbeOutput = serde_json::from_str(&json).map_err(|e| ToolError::Malformed {
        tool: "ffprobe".to_string(),
        detail: e.to_string(),
    })?;

    let tracks = parsed
        .streams
        .into_iter()
        .enumerate()
        .map(|(i, stream)| {
            let index = stream.index.unwrap_or(i as u32);
            let codec = stream.codec_name.unwrap_or_else(|| "unknown".to_string());
            let channels = stream.channels.unwrap_or(0);
            let sample_rate = stream
                .sample_rate
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let language = stream
                .tags
                .get("language")
                .cloned()
                .unwrap_or_else(|| "und".to_string());
            let title = stream
                .tags
                .get("title")
                .cloned()
                .unwrap_or_else(|| format!("Audio Track {}", i + 1));
            let label = format!(
                "Track {}: {} ({}ch)",
                i + 1,
                stream.tags.get("title").unwrap_or(&language),
                channels
            );
            AudioTrack {
                index,
                codec,
                channels,
                sample_rate,
                language,
                title,
                label,
            }
        })
        .collect();

    Ok(tracks)
}

/// Queries a media file's duration in seconds. Returns `None` when the
/// container does not report one.
pub fn duration_secs(ffprobe: &Path, media: &Path) -> Result<Option<f64>, ToolError> {
    if !media.exists() {
        return Err(ToolError::MissingFile(media.to_path_buf()));
    }

    let mut cmd = Command::new(ffprobe);
    cmd.arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(media);

    let output = run_capture("ffprobe", cmd)?;
    Ok(output.trim().parse().ok())
}
