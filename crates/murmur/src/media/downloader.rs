//! Video downloader invocation and output parsing.
//!
//! The downloader is an opaque command (yt-dlp compatible) that prints
//! `[download]` progress lines and destination paths on stdout. Produced
//! files are collected from those lines, with a recent-file scan of the
//! download directory as a fallback for output formats the parser does
//! not recognise.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use regex::Regex;

/// Container extensions treated as media files.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

/// How recently a file must have been modified for the fallback scan to
/// attribute it to the current download.
pub const RECENT_FILE_WINDOW: Duration = Duration::from_secs(3600);

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap())
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\] Destination: (.+)").unwrap())
}

fn merger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).unwrap())
}

fn already_downloaded_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\] (.+) has already been downloaded").unwrap())
}

/// Builds the download command for a URL.
pub fn download_command(downloader: &Path, download_dir: &Path, url: &str) -> Command {
    let template = download_dir.join("%(title)s [%(id)s].%(ext)s");
    let mut cmd = Command::new(downloader);
    cmd.arg("--newline")
        .arg("--no-warnings")
        .arg("-f")
        .arg("bestvideo[ext=mp4]+bestaudio[ext=m4a]/mp4")
        .arg("--merge-output-format")
        .arg("mp4")
        .arg("-o")
        .arg(template)
        .arg(url);
    cmd
}

/// Extracts a progress percentage from a downloader output line.
pub fn parse_progress(line: &str) -> Option<f64> {
    percent_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts a produced file path from a downloader output line. Merged
/// output wins over the per-format destination when both appear.
pub fn parse_produced_file(line: &str) -> Option<PathBuf> {
    for re in [merger_re(), destination_re(), already_downloaded_re()] {
        if let Some(captures) = re.captures(line) {
            if let Some(m) = captures.get(1) {
                return Some(PathBuf::from(m.as_str().trim()));
            }
        }
    }
    None
}

/// Whether a path looks like a playable media file.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Fallback discovery: media files under the download directory modified
/// within the recent window.
pub fn recent_media_files(download_dir: &Path) -> Vec<PathBuf> {
    let now = SystemTime::now();
    walkdir::WalkDir::new(download_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_media_file(e.path()))
        .filter(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|mtime| now.duration_since(mtime).ok())
                .map(|age| age < RECENT_FILE_WINDOW)
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}
