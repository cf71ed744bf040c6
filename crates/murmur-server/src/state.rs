//! Shared application state for HTTP handlers.

use std::sync::Arc;

use murmur::broadcast::JobEventBroadcaster;
use murmur::config::MurmurConfig;
use murmur::db::Database;
use murmur::executor::JobExecutor;
use murmur::ledger::JobLedger;

/// Cloned into every handler. All fields are `Arc`'d; clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MurmurConfig>,
    pub ledger: Arc<JobLedger>,
    pub executor: Arc<JobExecutor>,
}

impl AppState {
    /// Wires the ledger, broadcaster and executor for the given config.
    pub fn new(config: MurmurConfig) -> Result<Self, murmur::db::DatabaseError> {
        let config = Arc::new(config);
        let db = Database::open(&config.directories.database_path())?;
        let ledger = Arc::new(JobLedger::new(db, JobEventBroadcaster::default()));
        let executor = Arc::new(JobExecutor::new(Arc::clone(&ledger), Arc::clone(&config)));
        Ok(Self {
            config,
            ledger,
            executor,
        })
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn in_memory(config: MurmurConfig) -> Self {
        let config = Arc::new(config);
        let ledger = Arc::new(JobLedger::in_memory().expect("in-memory ledger"));
        let executor = Arc::new(JobExecutor::new(Arc::clone(&ledger), Arc::clone(&config)));
        Self {
            config,
            ledger,
            executor,
        }
    }
}
