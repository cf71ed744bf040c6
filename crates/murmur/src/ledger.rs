//! The job ledger: durable, queryable storage of all jobs, coupled to the
//! progress channel.
//!
//! The ledger is the single source of truth. Every other in-memory job
//! list (client side) is a cache that must eventually converge to it.
//! Every successful create/update fires a broadcast — this coupling is
//! intentional: the ledger is the point of truth that drives all client
//! notification. Transport failures never affect ledger writes; the two
//! are decoupled on the subscriber side.

use chrono::{DateTime, Utc};

use crate::broadcast::{JobDelta, JobEvent, JobEventBroadcaster};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::job::{Job, JobParameters, JobPatch, JobStatus, JobType, NewJobRequest};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn job_from_row(row: &JobRow) -> Job {
    let parameters: JobParameters = serde_json::from_str(&row.parameters).unwrap_or_else(|e| {
        log::warn!("Malformed parameters for job {}: {}", row.id, e);
        JobParameters::default()
    });

    Job {
        id: row.id.clone(),
        job_type: JobType::parse(&row.job_type, &row.id),
        status: JobStatus::parse(&row.status, &row.id),
        progress: row.progress,
        parameters,
        result: row.result.clone(),
        error: row.error.clone(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn row_from_job(job: &Job) -> JobRow {
    JobRow {
        id: job.id.clone(),
        job_type: job.job_type.as_str().to_string(),
        status: job.status.as_str().to_string(),
        progress: job.progress,
        parameters: serde_json::to_string(&job.parameters).unwrap_or_else(|e| {
            log::warn!("Failed to serialize parameters for job {}: {}", job.id, e);
            "{}".to_string()
        }),
        result: job.result.clone(),
        error: job.error.clone(),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
    }
}

// ─── JobLedger ──────────────────────────────────────────────────────────────

/// Persistent job ledger backed by rusqlite, broadcasting every mutation.
///
/// All database operations are synchronous and sub-millisecond, so the
/// ledger is safe to call from both worker threads and async request
/// handlers.
pub struct JobLedger {
    db: Database,
    events: JobEventBroadcaster,
}

impl JobLedger {
    pub fn new(db: Database, events: JobEventBroadcaster) -> Self {
        Self { db, events }
    }

    /// Opens an in-memory ledger for tests.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(
            Database::open_in_memory()?,
            JobEventBroadcaster::default(),
        ))
    }

    /// Subscribes to the progress channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Inserts a new queued job and broadcasts its full record.
    pub fn create(&self, request: NewJobRequest) -> Result<Job, DatabaseError> {
        let job = Job::new(request.job_type, request.parameters);
        job_repo::insert(&self.db, &row_from_job(&job))?;

        log::info!("Job {} created ({}, queued)", job.id, job.job_type);
        self.events.send(JobEvent::JobCreated(job.clone()));
        Ok(job)
    }

    /// Returns the job or `None` when the id is unknown.
    pub fn get(&self, id: &str) -> Result<Option<Job>, DatabaseError> {
        Ok(job_repo::find_by_id(&self.db, id)?
            .as_ref()
            .map(job_from_row))
    }

    /// Returns jobs newest-created-first, optionally restricted to a
    /// status set.
    pub fn list(&self, statuses: &[JobStatus]) -> Result<Vec<Job>, DatabaseError> {
        let filter = JobFilter {
            statuses: statuses.iter().map(|s| s.as_str().to_string()).collect(),
            ..Default::default()
        };
        let rows = job_repo::query(&self.db, &filter)?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// Applies a partial mutation, enforcing the status state machine, and
    /// broadcasts the resulting delta.
    ///
    /// Fails silently (logs only) when the id is not found — a slow
    /// handler writing into a since-deleted job must not crash its worker.
    /// Illegal transitions and stale progress regressions are dropped the
    /// same way. Returns the job as written, when a write happened.
    pub fn update(&self, id: &str, patch: JobPatch) -> Option<Job> {
        let row = match job_repo::find_by_id(&self.db, id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                log::warn!("Update for unknown job {} dropped", id);
                return None;
            }
            Err(e) => {
                log::error!("Failed to read job {} for update: {}", id, e);
                return None;
            }
        };

        let mut job = job_from_row(&row);

        if job.status.is_terminal() {
            log::warn!(
                "Update for job {} dropped: status {} is terminal",
                id,
                job.status
            );
            return None;
        }

        if let Some(next) = patch.status {
            if next != job.status && !job.status.can_transition(next) {
                log::warn!(
                    "Illegal status transition {} -> {} for job {} dropped",
                    job.status,
                    next,
                    id
                );
                return None;
            }
            job.status = next;
        }

        if let Some(percent) = patch.progress {
            // Stale handler callbacks may report out of order; progress
            // never moves backwards while a job is live.
            if percent >= job.progress {
                job.progress = percent.min(100);
            } else {
                log::debug!(
                    "Stale progress {}% (< {}%) for job {} ignored",
                    percent,
                    job.progress,
                    id
                );
            }
        }

        if let Some(chunk) = patch.result_append {
            match job.result {
                Some(ref mut text) => {
                    text.push('\n');
                    text.push_str(&chunk);
                }
                None => job.result = Some(chunk),
            }
        }

        if let Some(error) = patch.error {
            job.error = Some(error);
        }

        job.updated_at = Utc::now();

        match job_repo::update(&self.db, &row_from_job(&job)) {
            Ok(true) => {
                self.events.send(JobEvent::JobUpdate(JobDelta::of(&job)));
                Some(job)
            }
            Ok(false) => {
                log::warn!("Job {} vanished mid-update", id);
                None
            }
            Err(e) => {
                log::error!("Failed to persist update for job {}: {}", id, e);
                None
            }
        }
    }

    /// Atomically claims a queued job for execution (queued -> running).
    /// Exactly one caller wins the claim for a given job.
    pub fn claim(&self, id: &str) -> Result<bool, DatabaseError> {
        let claimed = job_repo::claim(&self.db, id, &format_timestamp(Utc::now()))?;
        if claimed {
            if let Some(job) = self.get(id)? {
                self.events.send(JobEvent::JobUpdate(JobDelta::of(&job)));
            }
        }
        Ok(claimed)
    }

    /// Removes a job row. Returns the count removed; a missing id yields
    /// 0, not an error.
    pub fn delete(&self, id: &str) -> Result<u64, DatabaseError> {
        let removed = job_repo::delete(&self.db, id)?;
        if removed > 0 {
            log::info!("Job {} deleted", id);
        }
        Ok(removed)
    }

    /// Removes all jobs in the given status set, for history cleanup.
    /// Returns the count removed.
    pub fn delete_where(&self, statuses: &[JobStatus]) -> Result<u64, DatabaseError> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let removed = job_repo::delete_where_status(&self.db, &names)?;
        if removed > 0 {
            log::info!(
                "Cleared {} job(s) with status in [{}]",
                removed,
                names.join(", ")
            );
        }
        Ok(removed)
    }

    /// Counts jobs with the given status.
    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        job_repo::count_by_status(&self.db, status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobParameters;

    fn transcribe_request(source: &str) -> NewJobRequest {
        NewJobRequest::new(
            JobType::Transcribe,
            JobParameters {
                source: Some(source.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_create_starts_queued_and_broadcasts() {
        let ledger = JobLedger::in_memory().unwrap();
        let mut rx = ledger.subscribe();

        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);

        match rx.try_recv().unwrap() {
            JobEvent::JobCreated(created) => assert_eq!(created.id, job.id),
            other => panic!("expected JobCreated, got {:?}", other),
        }

        let fetched = ledger.get(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert_eq!(
            fetched.parameters.source.as_deref(),
            Some("/tmp/a.mp4")
        );
    }

    #[test]
    fn test_get_unknown_id() {
        let ledger = JobLedger::in_memory().unwrap();
        assert!(ledger.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_broadcasts_delta() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert!(ledger.claim(&job.id).unwrap());

        let mut rx = ledger.subscribe();
        let updated = ledger
            .update(&job.id, JobPatch::progress(40, "processing audio"))
            .unwrap();
        assert_eq!(updated.progress, 40);

        match rx.try_recv().unwrap() {
            JobEvent::JobUpdate(delta) => {
                assert_eq!(delta.job_id, job.id);
                assert_eq!(delta.status, JobStatus::Running);
                assert_eq!(delta.progress, 40);
                assert_eq!(delta.result.as_deref(), Some("processing audio"));
            }
            other => panic!("expected JobUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_update_unknown_id_is_silent() {
        let ledger = JobLedger::in_memory().unwrap();
        // Must not panic or error; logged and dropped.
        assert!(ledger.update("ghost", JobPatch::progress(10, "hi")).is_none());
    }

    #[test]
    fn test_progress_never_regresses() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert!(ledger.claim(&job.id).unwrap());

        ledger.update(&job.id, JobPatch::progress(60, "ahead"));
        // A stale callback reports 30% late; the regression is ignored but
        // the message still lands.
        let after = ledger.update(&job.id, JobPatch::progress(30, "stale")).unwrap();
        assert_eq!(after.progress, 60);
        assert!(after.result.as_deref().unwrap().contains("stale"));
    }

    #[test]
    fn test_result_accumulates() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert!(ledger.claim(&job.id).unwrap());

        ledger.update(&job.id, JobPatch::progress(10, "first line"));
        ledger.update(&job.id, JobPatch::progress(20, "second line"));

        let job = ledger.get(&job.id).unwrap().unwrap();
        assert_eq!(job.result.as_deref(), Some("first line\nsecond line"));
    }

    #[test]
    fn test_terminal_status_is_absorbing() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert!(ledger.claim(&job.id).unwrap());
        ledger.update(&job.id, JobPatch::completed("done"));

        // A stale handler callback after completion must not change
        // anything, including the frozen result.
        assert!(ledger.update(&job.id, JobPatch::progress(10, "late")).is_none());
        assert!(ledger.update(&job.id, JobPatch::failed("boom")).is_none());

        let job = ledger.get(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result.as_deref(), Some("done"));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_illegal_transition_dropped() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();

        // Queued cannot jump straight to completed.
        assert!(ledger.update(&job.id, JobPatch::completed("nope")).is_none());
        let job = ledger.get(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_queued_job_can_be_cancelled() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();

        let cancelled = ledger.update(&job.id, JobPatch::cancelled()).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.error.is_none());
    }

    #[test]
    fn test_claim_is_single_shot() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();

        assert!(ledger.claim(&job.id).unwrap());
        assert!(!ledger.claim(&job.id).unwrap());

        let job = ledger.get(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn test_list_newest_first_with_filter() {
        let ledger = JobLedger::in_memory().unwrap();
        let a = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        let b = ledger.create(transcribe_request("/tmp/b.mp4")).unwrap();
        assert!(ledger.claim(&b.id).unwrap());
        ledger.update(&b.id, JobPatch::completed("done"));

        let all = ledger.list(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let queued = ledger.list(&[JobStatus::Queued]).unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, a.id);

        let terminal = ledger
            .list(&[JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled])
            .unwrap();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].id, b.id);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();

        assert_eq!(ledger.delete(&job.id).unwrap(), 1);
        assert_eq!(ledger.delete(&job.id).unwrap(), 0);
        assert_eq!(ledger.delete("never-existed").unwrap(), 0);
    }

    #[test]
    fn test_delete_where_clears_history() {
        let ledger = JobLedger::in_memory().unwrap();
        let live = ledger.create(transcribe_request("/tmp/live.mp4")).unwrap();
        let done = ledger.create(transcribe_request("/tmp/done.mp4")).unwrap();
        assert!(ledger.claim(&done.id).unwrap());
        ledger.update(&done.id, JobPatch::completed("done"));

        let removed = ledger
            .delete_where(&[JobStatus::Completed, JobStatus::Failed])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(ledger.get(&live.id).unwrap().is_some());
        assert!(ledger.get(&done.id).unwrap().is_none());
    }

    #[test]
    fn test_update_after_delete_is_silent() {
        let ledger = JobLedger::in_memory().unwrap();
        let job = ledger.create(transcribe_request("/tmp/a.mp4")).unwrap();
        assert!(ledger.claim(&job.id).unwrap());
        ledger.delete(&job.id).unwrap();

        // The handler's thread keeps reporting; nothing crashes.
        assert!(ledger.update(&job.id, JobPatch::progress(50, "late")).is_none());
    }
}
