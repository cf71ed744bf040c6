//! Server configuration: directories, external tool paths, polling tiers.
//!
//! Loaded from a YAML file with serde defaults for every field, so a
//! partial (or absent) config file always yields a runnable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MurmurConfig {
    pub directories: DirectoriesConfig,
    pub tools: ToolsConfig,
    pub polling: PollingConfig,
    pub server: ServerConfig,
}

/// Filesystem layout. Relative paths are resolved against the working
/// directory at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectoriesConfig {
    /// Where downloaded videos land.
    pub download_dir: PathBuf,
    /// Where uploaded files land.
    pub upload_dir: PathBuf,
    /// Where the SQLite database lives.
    pub data_dir: PathBuf,
    /// Where per-job log files are written.
    pub job_log_dir: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".murmur"))
            .unwrap_or_else(|| PathBuf::from(".murmur"));
        Self {
            download_dir: base.join("downloads"),
            upload_dir: base.join("uploads"),
            data_dir: base.join("data"),
            job_log_dir: base.join("logs").join("jobs"),
        }
    }
}

impl DirectoriesConfig {
    /// Path of the job database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("murmur.db")
    }

    /// Path of a job's dedicated log file.
    pub fn job_log_path(&self, job_id: &str) -> PathBuf {
        self.job_log_dir.join(format!("job_{}.log", job_id))
    }
}

/// External tool binaries. Bare names resolve through PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolsConfig {
    /// The media tool used for transcoding.
    pub ffmpeg: PathBuf,
    /// The probe tool used for track/duration detection.
    pub ffprobe: PathBuf,
    /// The video downloader.
    pub downloader: PathBuf,
    /// The opaque speech-to-text engine.
    pub speech_engine: PathBuf,
    /// The subtitle text translator.
    pub translator: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            downloader: PathBuf::from("yt-dlp"),
            speech_engine: PathBuf::from("whisper"),
            translator: PathBuf::from("trans"),
        }
    }
}

/// Client polling tiers. The fast tier applies while any job is
/// non-terminal, the slow tier when the system is idle; the two differ by
/// roughly an order of magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollingConfig {
    pub fast_secs: u64,
    pub slow_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_secs: 3,
            slow_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8591".to_string(),
        }
    }
}

/// Loads and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MurmurConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<MurmurConfig, ConfigError> {
    let config: MurmurConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads the config file when present, otherwise falls back to defaults.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<MurmurConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        log::info!(
            "No config file at {}, using defaults",
            path.display()
        );
        Ok(MurmurConfig::default())
    }
}

fn validate_config(config: &MurmurConfig) -> Result<(), ConfigError> {
    if config.polling.fast_secs == 0 || config.polling.slow_secs == 0 {
        return Err(ConfigError::Validation {
            message: "polling intervals must be greater than zero".to_string(),
        });
    }
    if config.polling.fast_secs >= config.polling.slow_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "fast polling tier ({}s) must be shorter than the slow tier ({}s)",
                config.polling.fast_secs, config.polling.slow_secs
            ),
        });
    }
    if config.server.bind.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "server bind address must not be empty".to_string(),
        });
    }
    Ok(())
}
