//! External media tool boundary.
//!
//! Every tool (downloader, probe, transcoder, speech engine, translator)
//! is an opaque command: it takes a media path or URL plus parameters and
//! returns structured output or a non-zero exit. The core never depends on
//! tool-specific output beyond what these wrappers parse.

use std::path::PathBuf;
use thiserror::Error;

pub mod downloader;
pub mod probe;
pub mod runner;
pub mod speech;
pub mod srt;
pub mod translator;

pub use probe::AudioTrack;

/// Errors from external tool invocations.
///
/// `detail` fields carry a trimmed summary of the tool's stderr, never a
/// raw dump.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed (exit code {code}): {detail}")]
    NonZeroExit {
        tool: String,
        code: i32,
        detail: String,
    },

    #[error("{tool} produced unreadable output: {detail}")]
    Malformed { tool: String, detail: String },

    #[error("{tool} was interrupted by cancellation")]
    Interrupted { tool: String },

    #[error("IO error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    MissingFile(PathBuf),
}
