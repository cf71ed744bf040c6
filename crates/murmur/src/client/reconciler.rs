//! The client reconciler: one authoritative in-memory job list, merged
//! from three independent input streams — the optimistic local insert at
//! submission time, pushed deltas, and polled full snapshots.
//!
//! The reconciler owns the canonical list and exposes only `merge` and
//! `snapshot`; there are no ambient globals. Everything it holds is a
//! cache of the server-side ledger and converges to it: a polled snapshot
//! always wins over stale local state.

use std::collections::HashMap;

use crate::broadcast::{JobDelta, JobEvent};
use crate::job::{Job, JobStatus};

/// An input to the merge.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Optimistic local insert at submission time, before any server
    /// confirmation. A UX optimization, not a correctness mechanism — the
    /// real record overwrites it when it arrives.
    Submitted(Job),
    /// A full record pushed for a newly created job.
    Created(Job),
    /// A pushed partial delta.
    Delta(JobDelta),
    /// A polled full snapshot: the ground-truth correction path.
    Snapshot(Vec<Job>),
}

impl From<JobEvent> for ClientEvent {
    fn from(event: JobEvent) -> Self {
        match event {
            JobEvent::JobCreated(job) => ClientEvent::Created(job),
            JobEvent::JobUpdate(delta) => ClientEvent::Delta(delta),
        }
    }
}

/// What the caller must do after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing further; the list absorbed the event.
    Merged,
    /// A delta arrived for an unknown id with status queued: a job
    /// created elsewhere that this client has not seen yet. Fetch the
    /// single record and feed it back as `Created`.
    FetchJob(String),
    /// A delta arrived for an unknown id in any other status: a
    /// reconciliation gap. Trigger a full-list refresh rather than guess.
    Resync,
}

/// Canonical client-side job list.
#[derive(Debug, Default)]
pub struct JobReconciler {
    jobs: HashMap<String, Job>,
}

impl JobReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one event, keyed by job id.
    pub fn merge(&mut self, event: ClientEvent) -> MergeOutcome {
        match event {
            ClientEvent::Submitted(job) | ClientEvent::Created(job) => {
                self.jobs.insert(job.id.clone(), job);
                MergeOutcome::Merged
            }
            ClientEvent::Delta(delta) => match self.jobs.get_mut(&delta.job_id) {
                Some(job) => {
                    job.status = delta.status;
                    job.progress = delta.progress;
                    if delta.result.is_some() {
                        job.result = delta.result;
                    }
                    if delta.error.is_some() {
                        job.error = delta.error;
                    }
                    MergeOutcome::Merged
                }
                None if delta.status == JobStatus::Queued => {
                    MergeOutcome::FetchJob(delta.job_id)
                }
                None => MergeOutcome::Resync,
            },
            ClientEvent::Snapshot(jobs) => {
                // Wholesale replacement: ground truth always wins.
                self.jobs = jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
                MergeOutcome::Merged
            }
        }
    }

    /// The full merged list in display order: all non-terminal jobs first,
    /// then terminal jobs, each group newest-created-first. Re-derived on
    /// every call, never maintained incrementally.
    pub fn snapshot(&self) -> Vec<Job> {
        self.view(None)
    }

    /// Like [`snapshot`](Self::snapshot), with the terminal section
    /// restricted to one selected terminal status.
    pub fn view(&self, terminal_filter: Option<JobStatus>) -> Vec<Job> {
        let mut live: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| j.status.is_non_terminal())
            .cloned()
            .collect();
        let mut finished: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .filter(|j| terminal_filter.map(|f| j.status == f).unwrap_or(true))
            .cloned()
            .collect();

        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        finished.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        live.extend(finished);
        live
    }

    /// Looks up one job by id.
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Count of jobs in a non-terminal status — the adaptive poller's
    /// input.
    pub fn non_terminal_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| j.status.is_non_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobParameters, JobType};

    fn job_with_status(status: JobStatus) -> Job {
        let mut job = Job::new(JobType::Transcribe, JobParameters::default());
        job.status = status;
        job
    }

    fn delta(job: &Job, status: JobStatus, progress: u8) -> JobDelta {
        JobDelta {
            job_id: job.id.clone(),
            status,
            progress,
            result: None,
            error: None,
        }
    }

    #[test]
    fn test_submitted_then_created_reconciles() {
        let mut rec = JobReconciler::new();

        // Optimistic insert before the server confirms.
        let provisional = job_with_status(JobStatus::Queued);
        rec.merge(ClientEvent::Submitted(provisional.clone()));
        assert_eq!(rec.len(), 1);

        // The real record arrives and overwrites it.
        let mut confirmed = provisional.clone();
        confirmed.status = JobStatus::Running;
        confirmed.progress = 5;
        rec.merge(ClientEvent::Created(confirmed));

        let job = rec.get(&provisional.id).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 5);
    }

    #[test]
    fn test_delta_merges_into_known_job() {
        let mut rec = JobReconciler::new();
        let job = job_with_status(JobStatus::Queued);
        rec.merge(ClientEvent::Created(job.clone()));

        let mut d = delta(&job, JobStatus::Running, 40);
        d.result = Some("partial output".to_string());
        assert_eq!(rec.merge(ClientEvent::Delta(d)), MergeOutcome::Merged);

        let merged = rec.get(&job.id).unwrap();
        assert_eq!(merged.status, JobStatus::Running);
        assert_eq!(merged.progress, 40);
        assert_eq!(merged.result.as_deref(), Some("partial output"));
        // Fields the delta does not carry retain their prior values.
        assert_eq!(merged.parameters, job.parameters);
        assert_eq!(merged.created_at, job.created_at);
    }

    #[test]
    fn test_delta_without_result_keeps_prior_result() {
        let mut rec = JobReconciler::new();
        let mut job = job_with_status(JobStatus::Running);
        job.result = Some("earlier output".to_string());
        rec.merge(ClientEvent::Created(job.clone()));

        rec.merge(ClientEvent::Delta(delta(&job, JobStatus::Running, 80)));
        assert_eq!(
            rec.get(&job.id).unwrap().result.as_deref(),
            Some("earlier output")
        );
    }

    #[test]
    fn test_unknown_queued_delta_requests_single_fetch() {
        let mut rec = JobReconciler::new();
        let ghost = job_with_status(JobStatus::Queued);

        let outcome = rec.merge(ClientEvent::Delta(delta(&ghost, JobStatus::Queued, 0)));
        assert_eq!(outcome, MergeOutcome::FetchJob(ghost.id.clone()));
        // Nothing was inserted yet; the caller feeds the fetched record back.
        assert!(rec.is_empty());

        rec.merge(ClientEvent::Created(ghost.clone()));
        assert!(rec.get(&ghost.id).is_some());
    }

    #[test]
    fn test_unknown_nonqueued_delta_requests_resync() {
        let mut rec = JobReconciler::new();
        let ghost = job_with_status(JobStatus::Running);

        let outcome = rec.merge(ClientEvent::Delta(delta(&ghost, JobStatus::Running, 50)));
        assert_eq!(outcome, MergeOutcome::Resync);
    }

    #[test]
    fn test_snapshot_replaces_wholesale() {
        let mut rec = JobReconciler::new();
        let stale = job_with_status(JobStatus::Running);
        rec.merge(ClientEvent::Created(stale.clone()));

        let fresh = job_with_status(JobStatus::Queued);
        rec.merge(ClientEvent::Snapshot(vec![fresh.clone()]));

        // The stale local row is gone; ground truth won.
        assert!(rec.get(&stale.id).is_none());
        assert!(rec.get(&fresh.id).is_some());
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_display_order_non_terminal_first() {
        let mut rec = JobReconciler::new();

        let mut old_running = job_with_status(JobStatus::Running);
        old_running.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let mut newer_done = job_with_status(JobStatus::Completed);
        newer_done.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
        let newest_queued = job_with_status(JobStatus::Queued);

        rec.merge(ClientEvent::Snapshot(vec![
            newer_done.clone(),
            old_running.clone(),
            newest_queued.clone(),
        ]));

        let view = rec.snapshot();
        let ids: Vec<&str> = view.iter().map(|j| j.id.as_str()).collect();
        // Non-terminal first (newest first), terminal after.
        assert_eq!(
            ids,
            vec![
                newest_queued.id.as_str(),
                old_running.id.as_str(),
                newer_done.id.as_str()
            ]
        );
    }

    #[test]
    fn test_view_filters_terminal_category() {
        let mut rec = JobReconciler::new();
        let completed = job_with_status(JobStatus::Completed);
        let failed = job_with_status(JobStatus::Failed);
        let running = job_with_status(JobStatus::Running);
        rec.merge(ClientEvent::Snapshot(vec![
            completed.clone(),
            failed.clone(),
            running.clone(),
        ]));

        let view = rec.view(Some(JobStatus::Failed));
        let ids: Vec<&str> = view.iter().map(|j| j.id.as_str()).collect();
        assert!(ids.contains(&running.id.as_str()));
        assert!(ids.contains(&failed.id.as_str()));
        assert!(!ids.contains(&completed.id.as_str()));
    }

    #[test]
    fn test_non_terminal_count() {
        let mut rec = JobReconciler::new();
        rec.merge(ClientEvent::Snapshot(vec![
            job_with_status(JobStatus::Queued),
            job_with_status(JobStatus::Running),
            job_with_status(JobStatus::Completed),
            job_with_status(JobStatus::Cancelled),
        ]));
        assert_eq!(rec.non_terminal_count(), 2);
    }

    #[test]
    fn test_any_interleaving_converges_to_snapshot() {
        // Deltas before and after the snapshot, in arbitrary order: the
        // final state for every id present in the latest snapshot equals
        // the snapshot's (plus deltas applied after it).
        let mut rec = JobReconciler::new();

        let a = job_with_status(JobStatus::Running);
        let b = job_with_status(JobStatus::Queued);

        rec.merge(ClientEvent::Created(a.clone()));
        rec.merge(ClientEvent::Delta(delta(&a, JobStatus::Running, 30)));

        // Ground-truth snapshot: a at 60%, b queued.
        let mut a_truth = a.clone();
        a_truth.progress = 60;
        rec.merge(ClientEvent::Snapshot(vec![a_truth.clone(), b.clone()]));

        // A late (stale, pre-snapshot) delta for a known id still merges;
        // the next snapshot corrects any staleness.
        rec.merge(ClientEvent::Delta(delta(&a, JobStatus::Running, 45)));
        rec.merge(ClientEvent::Snapshot(vec![a_truth.clone(), b.clone()]));

        assert_eq!(rec.get(&a.id).unwrap().progress, 60);
        assert_eq!(rec.get(&b.id).unwrap().status, JobStatus::Queued);
        assert_eq!(rec.len(), 2);
    }
}
