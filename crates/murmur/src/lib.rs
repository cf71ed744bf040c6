pub mod broadcast;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod job;
pub mod ledger;
pub mod media;

pub use broadcast::{JobDelta, JobEvent, JobEventBroadcaster};
pub use client::{AdaptivePoller, JobFetch, JobReconciler, PollDriver, PollTier};
pub use config::{load_config, load_or_default, MurmurConfig};
pub use error::{ConfigError, MurmurError, Result, SubmitError};
pub use executor::{CancelToken, JobExecutor};
pub use job::{Job, JobParameters, JobPatch, JobStatus, JobType, NewJobRequest};
pub use ledger::JobLedger;
