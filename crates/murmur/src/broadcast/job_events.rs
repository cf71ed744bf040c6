//! Job event broadcaster for real-time status streaming.
//!
//! Delivery is at-most-once-per-update and best-effort: if no observers
//! are subscribed the event is simply dropped, never queued. The ledger,
//! not this channel, is authoritative — reconnecting observers resync via
//! a full list query.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Job, JobStatus};

/// A partial job update: only the fields that change at high frequency.
///
/// Kept small relative to the full record — parameters and timestamps are
/// never carried. `result` holds the full accumulated output text so that
/// observers merge by plain field replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDelta {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobDelta {
    /// Builds the delta for a job's current state.
    pub fn of(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}

/// An event on the progress channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was created. Carries the full record so observers that did
    /// not submit it can insert it directly.
    JobCreated(Job),
    /// A job changed. Carries a partial delta.
    JobUpdate(JobDelta),
}

impl JobEvent {
    /// The job id this event concerns.
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::JobCreated(job) => &job.id,
            JobEvent::JobUpdate(delta) => &delta.job_id,
        }
    }
}

/// Broadcasts job events to all current subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
