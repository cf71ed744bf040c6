use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Handler error: {0}")]
    Handler(#[from] crate::handlers::HandlerError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::media::ToolError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors rejected synchronously at submission, before any ledger row is
/// created.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Failed to dispatch job: {0}")]
    Dispatch(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
