//! Cooperative cancellation.
//!
//! A `CancelToken` is a small shared flag passed by reference into a job's
//! handler. Cancellation is best-effort, not preemptive: it takes effect
//! at the handler's next checkpoint (before a tool starts, between output
//! lines of a streaming tool, after a tool returns), never mid-call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cancellation flag for one job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Tokens of all live jobs, keyed by job id.
///
/// A token is registered at submission and removed once its job reaches a
/// terminal state, so `cancel` on an unknown id simply reports false.
#[derive(Default)]
pub struct CancelRegistry {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a token for a job.
    pub fn register(&self, job_id: &str) -> CancelToken {
        let token = CancelToken::new();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(job_id.to_string(), token.clone());
        }
        token
    }

    /// Sets the cancellation flag for a job. Returns whether a live token
    /// existed.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.tokens.lock() {
            Ok(tokens) => match tokens.get(job_id) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Drops a job's token after it reaches a terminal state.
    pub fn remove(&self, job_id: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(job_id);
        }
    }

    /// Number of live tokens, for diagnostics.
    pub fn len(&self) -> usize {
        self.tokens.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
